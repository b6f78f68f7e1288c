//! Group membership reconciliation: tracking rows always equal the
//! accounts x coins and accounts x namings cross products.

#[cfg(test)]
mod tests {
    use crate::db;
    use crate::error::ServiceError;
    use crate::models::{Naming, NetworkType};
    use crate::services::group::CreateGroup;
    use crate::services::network::CreateNetwork;
    use crate::tests::common::*;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_reconcile_builds_cross_product() {
        let services = setup(StubAdapter::new()).await;
        create_eth_network(&services).await;
        let usdc = create_coin(&services, "eth", "USDC", 6, Some(USDC_TOKEN)).await;
        let eth = create_coin(&services, "eth", "ETH", 18, None).await;
        let group = create_group(&services, &[ACCOUNT_A, ACCOUNT_B], &[usdc.as_str(), eth.as_str()], &[Naming::Ens]).await;

        let pool = pool(&services);
        assert_eq!(count(pool, "account_balances").await, 4);
        assert_eq!(count(pool, "account_names").await, 2);
        assert_eq!(count(pool, "group_balances").await, 2);
        assert_eq!(count(pool, "group_names").await, 1);

        let pairs: BTreeSet<(String, String)> = services
            .group
            .get_account_balances(&group.id)
            .await
            .unwrap()
            .into_iter()
            .map(|row| (row.account, row.coin))
            .collect();
        let expected: BTreeSet<(String, String)> = [ACCOUNT_A, ACCOUNT_B]
            .iter()
            .flat_map(|a| [&usdc, &eth].map(|c| (a.to_string(), c.clone())))
            .collect();
        assert_eq!(pairs, expected);

        let names = services.group.get_account_names(&group.id).await.unwrap();
        assert!(names.iter().all(|row| row.network == "ethereum" && row.name.is_none()));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let services = setup(StubAdapter::new()).await;
        let (_, group) = usdc_fixture(&services, &[ACCOUNT_A, ACCOUNT_B]).await;

        let report = services.group.reconcile(&group.id).await.unwrap();
        assert!(report.is_noop());
        assert_eq!(count(pool(&services), "account_balances").await, 2);
    }

    #[tokio::test]
    async fn test_removing_coin_deletes_one_row_per_account() {
        let services = setup(StubAdapter::new()).await;
        create_eth_network(&services).await;
        let usdc = create_coin(&services, "eth", "USDC", 6, Some(USDC_TOKEN)).await;
        let eth = create_coin(&services, "eth", "ETH", 18, None).await;
        let group = create_group(&services, &[ACCOUNT_A, ACCOUNT_B], &[usdc.as_str(), eth.as_str()], &[]).await;

        let report = services.group.remove_coin(&group.id, &eth).await.unwrap();
        assert_eq!(report.balances.deleted_by_coin, 2);
        assert_eq!(report.balances.inserted, 0);

        let pool = pool(&services);
        assert_eq!(count(pool, "account_balances").await, 2);
        // the summary row of the removed coin goes with it
        assert!(db::group_balance::get(pool, &group.id, &eth).await.unwrap().is_none());
        assert!(db::group_balance::get(pool, &group.id, &usdc).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_removing_account_drops_summary_keys() {
        let services = setup(StubAdapter::new()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A, ACCOUNT_B]).await;
        let pool = pool(&services);

        for row in services.group.get_account_balances(&group.id).await.unwrap() {
            assert!(db::account_balance::record_balance(pool, &row, Decimal::ONE, "1000000", db::now_millis())
                .await
                .unwrap());
        }
        let summary = db::group_balance::get(pool, &group.id, &usdc).await.unwrap().unwrap();
        assert_eq!(summary.balances.len(), 2);

        let report = services
            .group
            .set_accounts(&group.id, &[ACCOUNT_A.to_string()])
            .await
            .unwrap();
        assert_eq!(report.balances.deleted_by_account, 1);

        let summary = db::group_balance::get(pool, &group.id, &usdc).await.unwrap().unwrap();
        assert_eq!(summary.balances.keys().collect::<Vec<_>>(), vec![ACCOUNT_A]);
        assert_eq!(summary.checked_at.keys().collect::<Vec<_>>(), vec![ACCOUNT_A]);
    }

    #[tokio::test]
    async fn test_inconsistent_membership_is_rejected() {
        let services = setup(StubAdapter::new()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A]).await;

        let err = services.group.add_naming(&group.id, Naming::Ans).await.unwrap_err();
        assert!(matches!(err, ServiceError::User(_)));

        let err = services.group.add_coin(&group.id, "eth__nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::User(_)));

        services
            .network
            .create_network(CreateNetwork {
                id: "solana".to_string(),
                network_type: NetworkType::Solana,
                rpc_urls: vec![],
                explorer_address: String::new(),
                explorer_token: String::new(),
            })
            .await
            .unwrap();
        let err = services
            .group
            .create_group(CreateGroup {
                name: "sol".to_string(),
                network_type: NetworkType::Solana,
                notes: String::new(),
                accounts: vec![],
                coins: vec![usdc.clone()],
                namings: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::User(_)));

        let err = services
            .group
            .set_accounts(&group.id, &["not-an-address".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        // nothing changed
        assert_eq!(count(pool(&services), "account_balances").await, 1);
    }

    #[tokio::test]
    async fn test_naming_add_and_remove() {
        let services = setup(StubAdapter::new()).await;
        let (_, group) = usdc_fixture(&services, &[ACCOUNT_A, ACCOUNT_B]).await;

        let report = services.group.add_naming(&group.id, Naming::Ens).await.unwrap();
        assert_eq!(report.names.inserted, 2);

        let report = services.group.remove_naming(&group.id, Naming::Ens).await.unwrap();
        assert_eq!(report.names.deleted_by_naming, 2);
        assert_eq!(count(pool(&services), "group_names").await, 0);
    }

    #[tokio::test]
    async fn test_delete_group_removes_rows() {
        let services = setup(StubAdapter::new()).await;
        let (_, group) = usdc_fixture(&services, &[ACCOUNT_A, ACCOUNT_B]).await;
        services.group.add_naming(&group.id, Naming::Ens).await.unwrap();

        services.group.delete_group(&group.id).await.unwrap();

        let pool = pool(&services);
        for table in ["account_groups", "account_balances", "account_names", "group_balances", "group_names"] {
            assert_eq!(count(pool, table).await, 0, "{} not empty", table);
        }
        assert!(matches!(
            services.group.get_group(&group.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_balances() {
        let services = setup(StubAdapter::new()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A]).await;
        let pool = pool(&services);

        let row = services.group.get_account_balances(&group.id).await.unwrap().remove(0);
        db::account_balance::record_balance(pool, &row, Decimal::TEN, "10000000", db::now_millis())
            .await
            .unwrap();

        assert_eq!(services.group.reset_balances(&group.id).await.unwrap(), 1);
        let row = db::account_balance::get(pool, row.id).await.unwrap().unwrap();
        assert!(row.balance.is_none() && row.checked_at.is_none());
        let summary = db::group_balance::get(pool, &group.id, &usdc).await.unwrap().unwrap();
        assert!(summary.balances.is_empty());
    }

    #[tokio::test]
    async fn test_accounts_info_sums_balances() {
        let services = setup(StubAdapter::new()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A, ACCOUNT_B]).await;
        let pool = pool(&services);

        for (row, value) in services
            .group
            .get_account_balances(&group.id)
            .await
            .unwrap()
            .iter()
            .zip([Decimal::new(15, 1), Decimal::new(25, 1)])
        {
            db::account_balance::record_balance(pool, row, value, "0", db::now_millis())
                .await
                .unwrap();
        }

        let info = services.group.accounts_info(&group.id).await.unwrap();
        assert_eq!(info.coins_sum[&usdc], Decimal::from(4));
        assert_eq!(info.balances[&usdc].len(), 2);
    }

    #[tokio::test]
    async fn test_remove_coin_normalizes_id() {
        let services = setup(StubAdapter::new()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A]).await;

        let report = services.group.remove_coin(&group.id, " ETH__USDC ").await.unwrap();
        assert_eq!(report.balances.deleted_by_coin, 1);
        let group = services.group.get_group(&group.id).await.unwrap();
        assert!(!group.coins.contains(&usdc));
        assert_eq!(count(pool(&services), "account_balances").await, 0);
    }

    async fn balance_pairs(services: &crate::services::Services, group: &str) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = services
            .group
            .get_account_balances(group)
            .await
            .unwrap()
            .into_iter()
            .map(|row| (row.account, row.coin))
            .collect();
        pairs.sort();
        pairs
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_edits_keep_cross_product() {
        let services = setup(StubAdapter::new()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A]).await;
        let eth = create_coin(&services, "eth", "ETH", 18, None).await;

        for round in 0..10 {
            // even rounds grow the group, odd rounds shrink it back
            let grow = round % 2 == 0;
            let accounts: Vec<String> = if grow {
                vec![ACCOUNT_A.to_string(), ACCOUNT_B.to_string()]
            } else {
                vec![ACCOUNT_A.to_string()]
            };
            let mut coins = if grow { vec![usdc.clone(), eth.clone()] } else { vec![usdc.clone()] };
            coins.sort();

            let coin_edit = {
                let (services, group, eth) = (services.clone(), group.id.clone(), eth.clone());
                tokio::spawn(async move {
                    if grow {
                        services.group.add_coin(&group, &eth).await.unwrap();
                    } else {
                        services.group.remove_coin(&group, &eth).await.unwrap();
                    }
                })
            };
            let account_edit = {
                let (services, group, accounts) = (services.clone(), group.id.clone(), accounts.clone());
                tokio::spawn(async move { services.group.set_accounts(&group, &accounts).await.unwrap() })
            };
            coin_edit.await.unwrap();
            account_edit.await.unwrap();

            let current = services.group.get_group(&group.id).await.unwrap();
            let mut current_coins = current.coins.clone();
            current_coins.sort();
            assert_eq!(current.accounts, accounts);
            assert_eq!(current_coins, coins);

            let mut expected: Vec<(String, String)> = accounts
                .iter()
                .flat_map(|a| coins.iter().map(move |c| (a.clone(), c.clone())))
                .collect();
            expected.sort();
            assert_eq!(balance_pairs(&services, &group.id).await, expected, "round {}", round);
            assert_eq!(services.group.get_group_balances(&group.id).await.unwrap().len(), coins.len());
        }
    }
}
