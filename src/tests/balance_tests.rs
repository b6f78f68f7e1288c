//! Balance checks against a scripted adapter.

#[cfg(test)]
mod tests {
    use crate::blockchain::client::ClientError;
    use crate::db;
    use crate::error::ServiceError;
    use crate::services::balance::CHECK_ATTEMPTS;
    use crate::services::network::CreateNetwork;
    use crate::models::settings::MAX_CHECK_INTERVAL_MINUTES;
    use crate::models::{NetworkType, SettingsUpdate};
    use crate::tests::common::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::time::Duration;

    const ACCOUNTS: [&str; 6] = [
        "0x0000000000000000000000000000000000000001",
        "0x0000000000000000000000000000000000000002",
        "0x0000000000000000000000000000000000000003",
        "0x0000000000000000000000000000000000000004",
        "0x0000000000000000000000000000000000000005",
        "0x0000000000000000000000000000000000000006",
    ];

    #[tokio::test]
    async fn test_retry_succeeds_on_last_attempt() {
        let adapter = StubAdapter::new();
        let services = setup(adapter.clone()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A]).await;
        let row = services.group.get_account_balances(&group.id).await.unwrap().remove(0);

        adapter.push_failures(CHECK_ATTEMPTS - 1);
        adapter.push_balance(Ok(1_000_000));

        let checked = services.balance.check_account_balance(row.id).await.unwrap();
        assert_eq!(checked.balance.unwrap().to_string(), "1.00000");
        assert_eq!(checked.balance_raw.as_deref(), Some("1000000"));
        assert!(checked.checked_at.is_some());
        assert_eq!(adapter.balance_calls(), CHECK_ATTEMPTS);

        let pool = pool(&services);
        let (attempts, succeeded) = db::rpc_monitoring::count_by_account(pool, &usdc, ACCOUNT_A).await.unwrap();
        assert_eq!((attempts, succeeded), (5, 1));

        let failures = db::rpc_monitoring::find_recent(pool, Some("eth"), Some(false), 10).await.unwrap();
        assert_eq!(failures.len(), 4);
        assert!(failures.iter().all(|r| r.error.is_some() && r.rpc_url == "https://rpc.example.org"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_leave_row_unchecked() {
        let adapter = StubAdapter::new();
        let services = setup(adapter.clone()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A]).await;
        let row = services.group.get_account_balances(&group.id).await.unwrap().remove(0);

        let err = services.balance.check_account_balance(row.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Client(ClientError::Rpc(_))));
        assert_eq!(adapter.balance_calls(), CHECK_ATTEMPTS);

        let pool = pool(&services);
        let stored = db::account_balance::get(pool, row.id).await.unwrap().unwrap();
        assert!(stored.checked_at.is_none());
        assert!(stored.balance.is_none());
        assert_eq!(
            db::rpc_monitoring::count_by_account(pool, &usdc, ACCOUNT_A).await.unwrap(),
            (5, 0)
        );

        let candidates = services.balance.select_candidates("eth", 10, 15).await.unwrap();
        assert_eq!(candidates.iter().map(|r| r.id).collect::<Vec<_>>(), vec![row.id]);
    }

    #[tokio::test]
    async fn test_missing_rpc_url_is_not_retried() {
        let adapter = StubAdapter::new();
        let services = setup(adapter.clone()).await;
        services
            .network
            .create_network(CreateNetwork {
                id: "eth".to_string(),
                network_type: NetworkType::Evm,
                rpc_urls: vec![],
                explorer_address: String::new(),
                explorer_token: String::new(),
            })
            .await
            .unwrap();
        let usdc = create_coin(&services, "eth", "USDC", 6, Some(USDC_TOKEN)).await;
        let group = create_group(&services, &[ACCOUNT_A], &[usdc.as_str()], &[]).await;
        let row = services.group.get_account_balances(&group.id).await.unwrap().remove(0);

        let err = services.balance.check_account_balance(row.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Client(ClientError::NoRpcUrl(_))));
        assert_eq!(adapter.balance_calls(), 0);
        assert_eq!(count(pool(&services), "rpc_monitoring").await, 0);
    }

    #[tokio::test]
    async fn test_selection_prefers_never_checked() {
        let services = setup(StubAdapter::new()).await;
        let (_, group) = usdc_fixture(&services, &ACCOUNTS[..6]).await;
        let rows = services.group.get_account_balances(&group.id).await.unwrap();
        let pool = pool(&services);

        let now = db::now_millis();
        // two stale, one fresh, three never checked
        set_checked_at(pool, rows[0].id, now - 60 * 60_000).await;
        set_checked_at(pool, rows[1].id, now - 30 * 60_000).await;
        set_checked_at(pool, rows[2].id, now).await;
        let never_checked: Vec<i64> = rows[3..].iter().map(|r| r.id).collect();

        let selected = services.balance.select_candidates("eth", 4, 15).await.unwrap();
        assert_eq!(selected.len(), 4);
        let ids: Vec<i64> = selected.iter().map(|r| r.id).collect();
        assert!(never_checked.iter().all(|id| ids.contains(id)));
        // the oldest stale row tops up the batch
        assert!(ids.contains(&rows[0].id));
        assert!(!ids.contains(&rows[2].id));

        let selected = services.balance.select_candidates("eth", 10, 15).await.unwrap();
        assert_eq!(selected.len(), 5);
    }

    #[tokio::test]
    async fn test_deleted_row_reports_not_found() {
        let adapter = StubAdapter::new();
        let services = setup(adapter.clone()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A]).await;
        let row = services.group.get_account_balances(&group.id).await.unwrap().remove(0);

        services.group.remove_coin(&group.id, &usdc).await.unwrap();

        let err = services.balance.check_account_balance(row.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(adapter.balance_calls(), 0);
    }

    #[tokio::test]
    async fn test_disabled_checks_select_nothing() {
        let adapter = StubAdapter::new();
        let services = setup(adapter.clone()).await;
        usdc_fixture(&services, &[ACCOUNT_A]).await;

        assert!(!services.bot.toggle_check_balances().await.unwrap());
        assert_eq!(services.balance.check_next_network("eth").await.unwrap(), 0);
        assert_eq!(adapter.balance_calls(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_balance_pass() {
        let adapter = StubAdapter::new();
        let services = setup(adapter.clone()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A]).await;
        let pool = pool(&services);

        assert_eq!(count(pool, "account_balances").await, 1);
        assert_eq!(count(pool, "group_balances").await, 1);

        adapter.push_balance(Ok(5_000_000));
        assert_eq!(services.balance.check_next_network("eth").await.unwrap(), 1);

        let row = services.group.get_account_balances(&group.id).await.unwrap().remove(0);
        let expected = Decimal::from_str("5.00000").unwrap();
        assert_eq!(row.balance, Some(expected));
        assert_eq!(row.balance.unwrap().to_string(), "5.00000");

        let summary = db::group_balance::get(pool, &group.id, &usdc).await.unwrap().unwrap();
        assert_eq!(summary.balances[ACCOUNT_A], expected);
        assert_eq!(summary.checked_at.get(ACCOUNT_A), row.checked_at.as_ref());

        // the row is fresh now, so a second pass selects nothing
        assert_eq!(services.balance.check_next_network("eth").await.unwrap(), 0);
        assert_eq!(adapter.balance_calls(), 1);
    }

    #[tokio::test]
    async fn test_account_rpc_stats() {
        let adapter = StubAdapter::new();
        let services = setup(adapter.clone()).await;
        let (_, group) = usdc_fixture(&services, &[ACCOUNT_A]).await;
        let row = services.group.get_account_balances(&group.id).await.unwrap().remove(0);

        adapter.push_failures(1);
        adapter.push_balance(Ok(0));
        let checked = services.balance.check_account_balance(row.id).await.unwrap();
        assert_eq!(checked.balance, Some(Decimal::ZERO));

        let stats = services.balance.account_rpc_stats(row.id).await.unwrap();
        assert_eq!((stats.attempts, stats.succeeded), (2, 1));
    }

    #[tokio::test]
    async fn test_stats_report_oldest_only_when_all_checked() {
        let adapter = StubAdapter::new();
        let services = setup(adapter.clone()).await;
        let (usdc, _) = usdc_fixture(&services, &[ACCOUNT_A, ACCOUNT_B]).await;

        let stats = services.coin.stats().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!((stats[0].all, stats[0].never_checked), (2, 2));
        assert!(stats[0].oldest_checked_at.is_none());

        adapter.push_balance(Ok(1));
        adapter.push_balance(Ok(2));
        services.balance.check_next_network("eth").await.unwrap();

        let stats = services.network.stats().await.unwrap();
        assert_eq!(stats[0].network, "eth");
        assert_eq!(stats[0].never_checked, 0);
        assert!(stats[0].oldest_checked_at.is_some());
        assert_eq!(services.coin.stats().await.unwrap()[0].coin, usdc);
    }

    #[tokio::test]
    async fn test_huge_interval_does_not_overflow() {
        let adapter = StubAdapter::new();
        let services = setup(adapter.clone()).await;
        let (_, group) = usdc_fixture(&services, &[ACCOUNT_A, ACCOUNT_B]).await;
        let rows = services.group.get_account_balances(&group.id).await.unwrap();
        set_checked_at(pool(&services), rows[0].id, db::now_millis() - 60_000).await;

        let settings = services
            .bot
            .update_settings(SettingsUpdate {
                check_balance_interval: Some(i64::MAX),
                check_name_interval: Some(i64::MAX),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(settings.check_balance_interval, MAX_CHECK_INTERVAL_MINUTES);
        assert_eq!(settings.check_name_interval, MAX_CHECK_INTERVAL_MINUTES);

        // the never-checked row only; nothing is older than the clamped cutoff
        adapter.push_balance(Ok(1));
        assert_eq!(services.balance.check_next_network("eth").await.unwrap(), 1);
        assert_eq!(services.naming.check_next_naming(crate::models::Naming::Ens).await.unwrap(), 0);

        // values that bypass the settings clamp saturate instead of wrapping
        let selected = services.balance.select_candidates("eth", 10, i64::MAX).await.unwrap();
        assert!(selected.is_empty());
        let selected = services.balance.select_candidates("eth", 10, 0).await.unwrap();
        assert!(selected.iter().any(|r| r.id == rows[0].id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_passes_on_one_network_never_overlap() {
        let adapter = StubAdapter::slow(Duration::from_millis(30), 1_000_000);
        let services = setup(adapter.clone()).await;
        create_eth_network(&services).await;
        services
            .network
            .create_network(CreateNetwork {
                id: "arb".to_string(),
                network_type: NetworkType::Evm,
                rpc_urls: vec!["https://arb.example.org".to_string()],
                explorer_address: String::new(),
                explorer_token: String::new(),
            })
            .await
            .unwrap();
        let eth_usdc = create_coin(&services, "eth", "USDC", 6, Some(USDC_TOKEN)).await;
        let arb_usdc = create_coin(&services, "arb", "USDC", 6, Some(USDC_TOKEN)).await;
        create_group(&services, &ACCOUNTS, &[eth_usdc.as_str(), arb_usdc.as_str()], &[]).await;
        services
            .bot
            .update_settings(SettingsUpdate {
                limit_network_workers: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();

        let passes: Vec<_> = ["eth", "eth", "arb"]
            .into_iter()
            .map(|network| {
                let services = services.clone();
                tokio::spawn(async move { services.balance.check_next_network(network).await.unwrap() })
            })
            .collect();
        let mut selected = 0;
        for pass in passes {
            selected += pass.await.unwrap();
        }

        // the second eth pass waits for the first and finds every row fresh
        assert_eq!(selected, 12);
        assert_eq!(adapter.balance_calls(), 12);
        assert_eq!(adapter.peak_in_flight("https://rpc.example.org"), 2);
        assert_eq!(adapter.peak_in_flight("https://arb.example.org"), 2);
        // eth and arb ran side by side
        assert!(adapter.peak_total_in_flight() > 2);
    }
}
