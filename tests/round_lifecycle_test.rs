use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roundspin::db::init_db;
use roundspin::engine::{Clock, ManualClock, Timeline};
use roundspin::orchestration::{BidGateway, ManualWinnerError, RoundDriver, RoundLedger};
use roundspin::publish::{Envelope, GameEvent, RecordingPublisher};
use roundspin::{Digit, Phase, Repository, RoundStatus, TimeMs, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

const START_MS: i64 = 1_700_000_000_000;

async fn setup_repo() -> (Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Arc::new(Repository::new(pool)), temp_dir)
}

fn driver(repo: &Arc<Repository>, clock: &ManualClock) -> RoundDriver {
    RoundDriver::new(
        RoundLedger::new(repo.clone(), 10),
        Arc::new(clock.clone()),
        Timeline::canonical(),
    )
}

fn count(events: &[Envelope], name: &str) -> usize {
    events.iter().filter(|e| e.event.name() == name).count()
}

#[tokio::test]
async fn test_rounds_numbered_consecutively_under_jittered_ticks() {
    let (repo, _temp) = setup_repo().await;
    let clock = ManualClock::new(TimeMs::new(START_MS));
    let mut driver = driver(&repo, &clock);
    let mut rng = StdRng::seed_from_u64(42);
    let mut events = Vec::new();

    // Roughly five rounds of ticks arriving 0-3 seconds apart.
    while clock.now().as_ms() < START_MS + 5 * 68_000 {
        let outcome = driver.tick().await;
        assert!(outcome.error.is_none(), "tick failed: {:?}", outcome.error);
        events.extend(outcome.events);
        clock.advance_secs(rng.gen_range(0..=3));
    }

    let current = driver.current_round().unwrap().round_number;
    assert!(current >= 5);
    for n in 1..current {
        let round = repo.round_by_number(n).await.unwrap().expect("no gaps");
        assert_eq!(round.status, RoundStatus::Completed);
        assert_eq!(round.phase, Phase::Completed);
        assert!(round.bidding_locked);
        assert_eq!(round.winning_number, round.calculated_winning_number);
    }
    assert!(repo.round_by_number(current + 1).await.unwrap().is_none());

    let completed = (current - 1) as usize;
    assert_eq!(count(&events, "roundResult"), completed);
    assert_eq!(count(&events, "winnerAnnounced"), completed);
    assert_eq!(count(&events, "playSpin"), completed);
    assert_eq!(count(&events, "newRound"), current as usize);

    let mut seen = HashSet::new();
    for envelope in &events {
        if let GameEvent::NewRound(round) = &envelope.event {
            assert!(seen.insert(round.round_number), "round opened twice");
        }
    }
}

#[tokio::test]
async fn test_restart_resumes_round_without_recomputing_winner() {
    let (repo, _temp) = setup_repo().await;
    let clock = ManualClock::new(TimeMs::new(START_MS));

    let mut first = driver(&repo, &clock);
    first.tick().await;
    clock.advance_secs(58);
    first.tick().await;
    let calculated = first
        .current_round()
        .unwrap()
        .calculated_winning_number
        .expect("winner resolved at 57s");
    drop(first);

    let mut second = driver(&repo, &clock);
    let resumed = second.bootstrap().await.unwrap();
    assert!(resumed.is_empty());
    assert_eq!(second.current_round().unwrap().round_number, 1);

    clock.advance_secs(10);
    let outcome = second.tick().await;
    assert!(outcome.error.is_none());
    assert_eq!(count(&outcome.events, "manualWinnerWindow"), 0);
    assert_eq!(count(&outcome.events, "roundResult"), 1);

    let settled = repo.round_by_number(1).await.unwrap().unwrap();
    assert_eq!(settled.winning_number, Some(calculated));
    assert_eq!(second.current_round().unwrap().round_number, 2);
}

#[tokio::test]
async fn test_restart_after_completed_round_opens_next() {
    let (repo, _temp) = setup_repo().await;
    let clock = ManualClock::new(TimeMs::new(START_MS));
    let ledger = RoundLedger::new(repo.clone(), 10);
    let round = ledger.open_round(7, TimeMs::new(START_MS)).await.unwrap();
    ledger
        .settle_round(&round, Digit::new(3).unwrap(), TimeMs::new(START_MS))
        .await
        .unwrap();

    let mut driver = driver(&repo, &clock);
    let events = driver.bootstrap().await.unwrap();
    assert_eq!(driver.current_round().unwrap().round_number, 8);
    match &events[0].event {
        GameEvent::NewRound(new_round) => {
            assert_eq!(new_round.round_number, 8);
            assert_eq!(new_round.recent_winners, vec![Digit::new(3).unwrap()]);
        }
        other => panic!("expected newRound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_manual_override_wins_and_second_is_rejected() {
    let (repo, _temp) = setup_repo().await;
    let clock = ManualClock::new(TimeMs::new(START_MS));
    let recorder = RecordingPublisher::new();
    let gateway = BidGateway::new(repo.clone(), Arc::new(recorder), Arc::new(clock.clone()));
    let mut driver = driver(&repo, &clock);
    driver.tick().await;

    // Digit 9 is the only unbid digit, so without the override it would win.
    let alice = UserId::new("alice".to_string());
    repo.create_user(&alice, 1000, TimeMs::new(START_MS))
        .await
        .unwrap();
    for digit in 0..9 {
        gateway.place_bid(&alice, digit, 10).await.unwrap();
    }

    clock.advance_secs(53);
    driver.tick().await;
    driver
        .set_manual_winner(Digit::new(4).unwrap())
        .await
        .unwrap();
    assert!(matches!(
        driver.set_manual_winner(Digit::new(6).unwrap()).await,
        Err(ManualWinnerError::AlreadySet { round_number: 1 })
    ));

    clock.advance_secs(15);
    let outcome = driver.tick().await;
    assert_eq!(count(&outcome.events, "manualWinnerConfirmed"), 1);

    let round = repo.round_by_number(1).await.unwrap().unwrap();
    assert!(round.is_manual_winner);
    assert_eq!(round.winning_number, Some(Digit::new(4).unwrap().to_stored()));

    let bids = repo.bids_for_round(round.id).await.unwrap();
    let winning: Vec<_> = bids.iter().filter(|b| b.reward.unwrap_or(0) > 0).collect();
    assert_eq!(winning.len(), 1);
    assert_eq!(winning[0].bid_number.to_digit(), Digit::new(4).unwrap());
    assert!(winning[0].is_manual_winner);
    assert_eq!(winning[0].reward, Some(100));

    let balance = repo.get_balance(&alice).await.unwrap().unwrap();
    assert_eq!(balance.coins, 910);
    assert_eq!(balance.pending_winning_coins, 100);
}

#[tokio::test]
async fn test_winner_comes_from_unbid_digits() {
    for seed in 0..20u64 {
        let (repo, _temp) = setup_repo().await;
        let clock = ManualClock::new(TimeMs::new(START_MS + seed as i64));
        let gateway = BidGateway::new(
            repo.clone(),
            Arc::new(RecordingPublisher::new()),
            Arc::new(clock.clone()),
        );
        let mut driver = driver(&repo, &clock);
        driver.tick().await;

        let user = UserId::new(format!("user-{}", seed));
        repo.create_user(&user, 1000, TimeMs::new(START_MS))
            .await
            .unwrap();
        gateway.place_bid(&user, 2, 50).await.unwrap();
        gateway.place_bid(&user, 5, 30).await.unwrap();

        clock.advance_secs(57);
        driver.tick().await;
        let winner = driver
            .current_round()
            .unwrap()
            .calculated_winning_number
            .unwrap()
            .to_digit()
            .value();
        assert!(
            [0, 1, 3, 4, 6, 7, 8, 9].contains(&winner),
            "winner {} was bid on",
            winner
        );
    }
}
