use futures::future::join_all;
use roundspin::db::init_db;
use roundspin::engine::ManualClock;
use roundspin::orchestration::{BidError, BidGateway};
use roundspin::publish::RecordingPublisher;
use roundspin::{Repository, TimeMs, UserId};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup() -> (BidGateway, Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let gateway = BidGateway::new(
        repo.clone(),
        Arc::new(RecordingPublisher::new()),
        Arc::new(ManualClock::new(TimeMs::new(0))),
    );
    (gateway, repo, temp_dir)
}

#[tokio::test]
async fn test_concurrent_bids_never_overdraw() {
    let (gateway, repo, _temp) = setup().await;
    let user = UserId::new("alice".to_string());
    repo.create_user(&user, 1000, TimeMs::new(0)).await.unwrap();
    let round = repo.start_round(1, TimeMs::new(0)).await.unwrap();

    let attempts = (0..25).map(|i| {
        let gateway = gateway.clone();
        let user = user.clone();
        async move { gateway.place_bid(&user, i % 10, 100).await }
    });
    let results = join_all(attempts).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 10);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(BidError::InsufficientBalance { .. })
        ));
    }

    let balance = repo.get_balance(&user).await.unwrap().unwrap();
    assert_eq!(balance.coins, 0);
    let bids = repo.bids_for_round(round.id).await.unwrap();
    assert_eq!(bids.len(), 10);
    assert_eq!(bids.iter().map(|b| b.coins).sum::<i64>(), 1000);
}

#[tokio::test]
async fn test_bids_racing_the_lock_conserve_coins() {
    let (gateway, repo, _temp) = setup().await;
    let round = repo.start_round(1, TimeMs::new(0)).await.unwrap();
    let users: Vec<UserId> = (0..8).map(|i| UserId::new(format!("user-{}", i))).collect();
    for user in &users {
        repo.create_user(user, 500, TimeMs::new(0)).await.unwrap();
    }

    let bids = users.iter().flat_map(|user| {
        let gateway = gateway.clone();
        (0..5).map(move |digit| {
            let gateway = gateway.clone();
            let user = user.clone();
            async move {
                let _ = gateway.place_bid(&user, digit, 40).await;
            }
        })
    });
    let lock = {
        let repo = repo.clone();
        async move {
            tokio::task::yield_now().await;
            repo.lock_bidding(round.id).await.unwrap();
        }
    };
    tokio::join!(join_all(bids), lock);

    let recorded = repo.bids_for_round(round.id).await.unwrap();
    let mut total_coins = 0;
    for user in &users {
        total_coins += repo.get_balance(user).await.unwrap().unwrap().coins;
    }
    let wagered: i64 = recorded.iter().map(|b| b.coins).sum();
    assert_eq!(total_coins + wagered, 8 * 500);

    // Nothing gets in after the lock.
    let late = gateway.place_bid(&users[0], 9, 1).await;
    assert!(matches!(late, Err(BidError::BiddingClosed { .. })));
    assert_eq!(repo.bids_for_round(round.id).await.unwrap().len(), recorded.len());
}

#[tokio::test]
async fn test_bid_after_lock_leaves_balance_untouched() {
    let (gateway, repo, _temp) = setup().await;
    let user = UserId::new("bob".to_string());
    repo.create_user(&user, 1000, TimeMs::new(0)).await.unwrap();
    let round = repo.start_round(1, TimeMs::new(0)).await.unwrap();
    gateway.place_bid(&user, 3, 100).await.unwrap();

    repo.lock_bidding(round.id).await.unwrap();
    let rejected = gateway.place_bid(&user, 4, 100).await;
    assert!(matches!(rejected, Err(BidError::BiddingClosed { .. })));

    let balance = repo.get_balance(&user).await.unwrap().unwrap();
    assert_eq!(balance.coins, 900);
    assert_eq!(repo.bids_for_round(round.id).await.unwrap().len(), 1);
}
