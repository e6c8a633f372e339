use dashmap::DashMap;
use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AtaKey {
    owner: Pubkey,
    mint: Pubkey,
    token_program: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PdaKey {
    program_id: Pubkey,
    seeds: Vec<Vec<u8>>,
}

static ATA_CACHE: Lazy<DashMap<AtaKey, Pubkey>> = Lazy::new(DashMap::new);
static PDA_CACHE: Lazy<DashMap<PdaKey, Pubkey>> = Lazy::new(DashMap::new);

/// 返回缓存的 ATA 地址，未命中时计算并写入缓存。
pub fn cached_associated_token_address(
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Pubkey {
    let key = AtaKey {
        owner: *owner,
        mint: *mint,
        token_program: *token_program,
    };
    *ATA_CACHE.entry(key).or_insert_with(|| {
        Pubkey::find_program_address(
            &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
            &spl_associated_token_account::id(),
        )
        .0
    })
}

/// 返回缓存的 PDA（不含 bump）。
pub fn cached_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Pubkey {
    let key = PdaKey {
        program_id: *program_id,
        seeds: seeds.iter().map(|seed| seed.to_vec()).collect(),
    };
    if let Some(entry) = PDA_CACHE.get(&key) {
        return *entry;
    }
    let address = Pubkey::find_program_address(seeds, program_id).0;
    PDA_CACHE.insert(key, address);
    address
}
