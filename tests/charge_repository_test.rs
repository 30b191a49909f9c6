use chrono::{Duration, NaiveDate, Utc};
use pix_bridge::{
    domain::{
        AdditionalInfo, Charge, ChargeKind, ChargeStatus, ChargeType, Debtor, DueDateTerms,
        Refund, RefundStatus, ValueTerm,
    },
    repository::{ChargeRepository, SqliteChargeRepository},
};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::str::FromStr;

async fn setup() -> anyhow::Result<(SqlitePool, SqliteChargeRepository)> {
    // A single connection keeps every query on the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await?;

    let repo = SqliteChargeRepository::new(pool.clone());
    Ok((pool, repo))
}

fn debtor() -> Debtor {
    Debtor {
        name: "Maria Silva".to_string(),
        cpf: Some("12345678909".to_string()),
        ..Default::default()
    }
}

fn immediate(txid: &str) -> Charge {
    Charge::new(
        txid.to_string(),
        "pix@example.com".to_string(),
        Decimal::from_str("10.00").unwrap(),
        debtor(),
        ChargeKind::Immediate { expiry_seconds: 3600 },
    )
}

fn with_due_date(txid: &str, due_date: NaiveDate) -> Charge {
    Charge::new(
        txid.to_string(),
        "pix@example.com".to_string(),
        Decimal::from_str("150.00").unwrap(),
        debtor(),
        ChargeKind::WithDueDate(DueDateTerms::new(due_date)),
    )
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn upsert_is_idempotent_on_txid() -> anyhow::Result<()> {
    let (pool, repo) = setup().await?;

    let first = repo.upsert(immediate("cob001iaaaaaaaaaaaaaaaaaaaaaaaaaaaa1")).await?;

    // A second charge object for the same txid updates the existing row
    let mut again = immediate("cob001iaaaaaaaaaaaaaaaaaaaaaaaaaaaa1");
    again.revision = 2;
    again.location = Some("pix.example.com/qr/v2/abc".to_string());
    let second = repo.upsert(again).await?;

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at.timestamp(), first.created_at.timestamp());
    assert_eq!(second.revision, 2);
    assert_eq!(second.location.as_deref(), Some("pix.example.com/qr/v2/abc"));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM charges WHERE txid = ?")
        .bind("cob001iaaaaaaaaaaaaaaaaaaaaaaaaaaaa1")
        .fetch_one(&pool)
        .await?;
    assert_eq!(rows, 1);
    assert_eq!(repo.count().await?, 1);

    Ok(())
}

#[tokio::test]
async fn find_unknown_txid_returns_none() -> anyhow::Result<()> {
    let (_pool, repo) = setup().await?;
    assert!(repo.find_by_txid("nope").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn due_date_terms_payment_and_children_survive_a_round_trip() -> anyhow::Result<()> {
    let (_pool, repo) = setup().await?;

    let mut charge = with_due_date("cobv001ibbbbbbbbbbbbbbbbbbbbbbbbbbb1", date("2026-12-10"));
    if let Some(terms) = charge.due_terms_mut() {
        terms.grace_days_after_due = 15;
        terms.fine = Some(ValueTerm { mode: 2, value: Decimal::from_str("2.00").unwrap() });
        terms.interest = Some(ValueTerm { mode: 2, value: Decimal::from_str("1.50").unwrap() });
    }
    charge.debtor.city = Some("Brasília".to_string());
    charge.additional_info = vec![
        AdditionalInfo { name: "Pedido".to_string(), value: "42".to_string() },
        AdditionalInfo { name: "Loja".to_string(), value: "Centro".to_string() },
    ];
    charge.register_payment("E123".to_string(), Decimal::from_str("150.00").unwrap(), None);
    charge.refunds = vec![Refund {
        refund_id: "D1".to_string(),
        return_id: Some("D00000000202612101200abcdef".to_string()),
        amount: Decimal::from_str("50.00").unwrap(),
        nature: Some("ORIGINAL".to_string()),
        description: None,
        requested_at: Some(Utc::now()),
        settled_at: None,
        status: RefundStatus::Processing,
        failure_reason: None,
    }];

    repo.upsert(charge).await?;
    let stored = repo
        .find_by_txid("cobv001ibbbbbbbbbbbbbbbbbbbbbbbbbbb1")
        .await?
        .expect("charge stored");

    assert_eq!(stored.charge_type(), ChargeType::Cobv);
    assert_eq!(stored.status, ChargeStatus::Completed);
    assert_eq!(stored.original_amount, Decimal::from_str("150.00").unwrap());

    let terms = stored.due_terms().expect("due-date terms");
    assert_eq!(terms.due_date, date("2026-12-10"));
    assert_eq!(terms.grace_days_after_due, 15);
    assert_eq!(terms.fine.map(|f| f.mode), Some(2));
    assert!(terms.discount.is_none());

    assert_eq!(stored.debtor.city.as_deref(), Some("Brasília"));
    assert_eq!(stored.payment.as_ref().map(|p| p.settlement_id.as_str()), Some("E123"));
    assert_eq!(stored.additional_info.len(), 2);
    assert_eq!(stored.additional_info[0].name, "Pedido");
    assert_eq!(stored.refunds.len(), 1);
    assert_eq!(stored.refunds[0].status, RefundStatus::Processing);

    // Children are rewritten, not appended
    let mut updated = stored.clone();
    updated.additional_info.truncate(1);
    let updated = repo.upsert(updated).await?;
    assert_eq!(updated.additional_info.len(), 1);
    assert_eq!(updated.refunds.len(), 1);

    Ok(())
}

#[tokio::test]
async fn list_recent_filters_by_type() -> anyhow::Result<()> {
    let (_pool, repo) = setup().await?;

    repo.upsert(immediate("cob001icccccccccccccccccccccccccccc1")).await?;
    repo.upsert(immediate("cob001icccccccccccccccccccccccccccc2")).await?;
    repo.upsert(with_due_date("cobv001icccccccccccccccccccccccccccc", date("2026-12-01"))).await?;

    assert_eq!(repo.list_recent(None, 10).await?.len(), 3);
    assert_eq!(repo.list_recent(Some(ChargeType::Cob), 10).await?.len(), 2);
    assert_eq!(repo.list_recent(Some(ChargeType::Cob), 1).await?.len(), 1);

    let cobv = repo.list_recent(Some(ChargeType::Cobv), 10).await?;
    assert_eq!(cobv.len(), 1);
    assert_eq!(cobv[0].charge_type(), ChargeType::Cobv);

    Ok(())
}

#[tokio::test]
async fn list_overdue_only_returns_active_due_date_charges() -> anyhow::Result<()> {
    let (_pool, repo) = setup().await?;

    repo.upsert(with_due_date("cobv001iddddddddddddddddddddddddddd1", date("2026-01-10"))).await?;
    repo.upsert(with_due_date("cobv001iddddddddddddddddddddddddddd2", date("2026-03-10"))).await?;

    let mut paid = with_due_date("cobv001iddddddddddddddddddddddddddd3", date("2026-01-05"));
    paid.register_payment("E1".to_string(), Decimal::from_str("150.00").unwrap(), None);
    repo.upsert(paid).await?;

    let mut removed = with_due_date("cobv001iddddddddddddddddddddddddddd4", date("2026-01-05"));
    removed.cancel();
    repo.upsert(removed).await?;

    let overdue = repo.list_overdue(date("2026-02-01")).await?;
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].txid, "cobv001iddddddddddddddddddddddddddd1");

    // Due today is not overdue yet
    assert!(repo.list_overdue(date("2026-01-10")).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn list_due_between_covers_due_dates_and_active_expiries() -> anyhow::Result<()> {
    let (_pool, repo) = setup().await?;

    repo.upsert(with_due_date("cobv001ieeeeeeeeeeeeeeeeeeeeeeeeeee1", date("2026-05-10"))).await?;
    repo.upsert(with_due_date("cobv001ieeeeeeeeeeeeeeeeeeeeeeeeeee2", date("2026-07-01"))).await?;
    repo.upsert(immediate("cob001ieeeeeeeeeeeeeeeeeeeeeeeeeeee1")).await?;

    let charges = repo
        .list_due_between(date("2026-05-01"), date("2026-05-31"))
        .await?;
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].txid, "cobv001ieeeeeeeeeeeeeeeeeeeeeeeeeee1");

    // An active immediate charge shows up on the day it expires
    let today = Utc::now().date_naive();
    let around_today = repo
        .list_due_between(today - Duration::days(1), today + Duration::days(1))
        .await?;
    assert!(around_today.iter().any(|c| c.txid == "cob001ieeeeeeeeeeeeeeeeeeeeeeeeeeee1"));

    Ok(())
}
