pub mod balance;
pub mod bot;
pub mod coin;
pub mod group;
pub mod history;
pub mod naming;
pub mod network;

use crate::cache::CoinCacheManager;
use crate::error::ServiceResult;
use crate::state::AppState;
use std::sync::Arc;

pub use balance::BalanceService;
pub use bot::BotService;
pub use coin::CoinService;
pub use group::GroupService;
pub use history::HistoryService;
pub use naming::NamingService;
pub use network::NetworkService;

/// Every service wired to one shared state. Built once at startup and shared
/// by the HTTP layer and the scheduler.
pub struct Services {
    pub state: Arc<AppState>,
    pub network: Arc<NetworkService>,
    pub coin: Arc<CoinService>,
    pub group: Arc<GroupService>,
    pub balance: Arc<BalanceService>,
    pub naming: Arc<NamingService>,
    pub history: Arc<HistoryService>,
    pub bot: Arc<BotService>,
}

impl Services {
    pub async fn new(state: Arc<AppState>) -> ServiceResult<Self> {
        let coins_cache = CoinCacheManager::new(
            state.db_pool.clone(),
            state.config.coin_cache_max_capacity,
            state.config.coin_cache_ttl,
        );

        let network = Arc::new(NetworkService::new(state.clone()));
        network.load_from_storage().await?;

        let group = Arc::new(GroupService::new(state.clone(), network.clone(), coins_cache.clone()));
        let coin = Arc::new(CoinService::new(
            state.clone(),
            network.clone(),
            group.clone(),
            coins_cache.clone(),
        ));
        let balance = Arc::new(BalanceService::new(state.clone(), network.clone(), coins_cache));
        let naming = Arc::new(NamingService::new(state.clone(), network.clone()));
        let history = Arc::new(HistoryService::new(state.clone(), group.clone()));
        let bot = Arc::new(BotService::new(state.clone(), network.clone()));

        Ok(Self {
            state,
            network,
            coin,
            group,
            balance,
            naming,
            history,
            bot,
        })
    }
}
