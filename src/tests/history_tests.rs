#[cfg(test)]
mod tests {
    use crate::db;
    use crate::error::ServiceError;
    use crate::models::{CoinBalances, CoinCheckedAt};
    use crate::services::history::diff_balances;
    use crate::tests::common::*;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn balances(entries: &[(&str, &str, i64)]) -> CoinBalances {
        let mut result: CoinBalances = BTreeMap::new();
        for (coin, account, value) in entries {
            result
                .entry(coin.to_string())
                .or_default()
                .insert(account.to_string(), Decimal::from(*value));
        }
        result
    }

    #[test]
    fn test_diff_reports_only_changed_values() {
        let old = balances(&[("usdc", "addr1", 10), ("usdc", "addr2", 3), ("eth", "addr1", 1)]);
        let new = balances(&[("usdc", "addr1", 12), ("usdc", "addr2", 3), ("usdc", "addr3", 7)]);
        let none = CoinCheckedAt::new();

        let changes = diff_balances(&old, &none, &new, &none);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].coin, "usdc");
        assert_eq!(changes[0].account, "addr1");
        assert_eq!(changes[0].old_balance, Decimal::from(10));
        assert_eq!(changes[0].new_balance, Decimal::from(12));
    }

    #[tokio::test]
    async fn test_snapshot_and_diff() {
        let services = setup(StubAdapter::new()).await;
        let (usdc, group) = usdc_fixture(&services, &[ACCOUNT_A, ACCOUNT_B]).await;
        let pool = pool(&services);
        let rows = services.group.get_account_balances(&group.id).await.unwrap();

        for row in &rows {
            db::account_balance::record_balance(pool, row, Decimal::TEN, "10000000", 1_000)
                .await
                .unwrap();
        }
        let history = services.history.create(&group.id).await.unwrap();
        assert_eq!(history.group.id, group.id);
        assert_eq!(history.balances[&usdc].len(), 2);

        let changed = rows.iter().find(|r| r.account == ACCOUNT_A).unwrap();
        db::account_balance::record_balance(pool, changed, Decimal::from(12), "12000000", 2_000)
            .await
            .unwrap();

        let changes = services.history.diff(&history.id).await.unwrap();
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!((change.coin.as_str(), change.account.as_str()), (usdc.as_str(), ACCOUNT_A));
        assert_eq!(change.old_balance, Decimal::TEN);
        assert_eq!(change.new_balance, Decimal::from(12));
        assert_eq!(change.old_checked_at.map(|t| t.timestamp_millis()), Some(1_000));
        assert_eq!(change.new_checked_at.map(|t| t.timestamp_millis()), Some(2_000));
    }

    #[tokio::test]
    async fn test_history_outlives_group() {
        let services = setup(StubAdapter::new()).await;
        let (_, group) = usdc_fixture(&services, &[ACCOUNT_A]).await;

        let history = services.history.create(&group.id).await.unwrap();
        services.group.delete_group(&group.id).await.unwrap();

        let listed = services.history.list(Some(group.id.as_str())).await.unwrap();
        assert_eq!(listed.len(), 1);
        let stored = services.history.get(&history.id).await.unwrap();
        assert_eq!(stored.group, history.group);
        assert_eq!(stored.balances, history.balances);

        services.history.delete(&history.id).await.unwrap();
        assert!(matches!(
            services.history.get(&history.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            services.history.delete(&history.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
