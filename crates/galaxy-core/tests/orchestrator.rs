mod common;

use galaxy_core::civilization::Resource;
use galaxy_core::kernel::Phase;
use galaxy_core::units::{
    AiDomain, BackgroundDomain, CivilizationDomain, FailureKind, InteractionDomain, SharedDomain,
    UnitCatalog,
};
use galaxy_core::{
    ActionRequest, CivilizationId, Engine, EngineConfig, EventKind, PlayerDescriptor, PlayerId,
};

use common::{Misbehavior, Overreach, Probe, ProbeClaimer, Recorder, Saboteur, StalledAdvisor};

fn probes(recorder: &Recorder) -> UnitCatalog {
    let (a, b, c, d, e) = (
        recorder.clone(),
        recorder.clone(),
        recorder.clone(),
        recorder.clone(),
        recorder.clone(),
    );
    UnitCatalog::new()
        .shared(SharedDomain::GalaxyMap, move || Box::new(Probe::new("shared", &a)))
        .civilization(CivilizationDomain::Economy, move |_| {
            Box::new(Probe::new("civilization", &b))
        })
        .interaction(InteractionDomain::Trade, move || {
            Box::new(Probe::new("interaction", &c))
        })
        .background(BackgroundDomain::RandomEvents, move || {
            Box::new(Probe::new("background", &d))
        })
        .ai(AiDomain::Psychology, move |_| Box::new(Probe::new("ai", &e)))
}

fn saboteur_catalog(target: &str, how: Misbehavior) -> UnitCatalog {
    let target = CivilizationId::from(target);
    UnitCatalog::new().civilization(CivilizationDomain::Population, move |_| {
        Box::new(Saboteur {
            target: target.clone(),
            how,
        })
    })
}

async fn with_humans(engine: &mut Engine, civs: &[&str]) {
    for civ in civs {
        engine
            .register_player(
                PlayerDescriptor::human(format!("ruler of {civ}"))
                    .with_id(format!("p-{civ}"))
                    .with_civilization(*civ),
            )
            .await
            .unwrap();
    }
}

fn credits(engine: &Engine, civ: &str) -> u64 {
    engine
        .civilizations()
        .get(&CivilizationId::from(civ))
        .unwrap()
        .resources
        .get(Resource::Credits)
}

#[tokio::test]
async fn phases_run_in_fixed_order_every_tick() {
    let recorder = Recorder::default();
    let mut engine = Engine::builder().catalog(probes(&recorder)).build();
    engine
        .register_player(PlayerDescriptor::ai("Hal").with_civilization("orion"))
        .await
        .unwrap();

    engine.process_tick().await.unwrap();
    engine.process_tick().await.unwrap();

    assert_eq!(
        recorder.entries(),
        vec![
            "shared@0",
            "civilization@0",
            "interaction@0",
            "background@0",
            "ai@0",
            "shared@1",
            "civilization@1",
            "interaction@1",
            "background@1",
            "ai@1",
        ]
    );
    assert_eq!(engine.tick(), 2);
}

#[tokio::test]
async fn failing_civilization_does_not_block_others() {
    let mut engine = Engine::builder()
        .catalog(saboteur_catalog("doomed", Misbehavior::Fail))
        .build();
    with_humans(&mut engine, &["doomed", "healthy"]).await;

    let report = engine.process_tick().await.unwrap();

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.tick, 0);
    assert_eq!(failure.phase, Phase::Civilization);
    assert_eq!(failure.unit, "saboteur");
    assert_eq!(failure.civilization, Some(CivilizationId::from("doomed")));
    assert_eq!(failure.kind, FailureKind::Error("ledger corrupted".into()));

    assert_eq!(credits(&engine, "healthy"), 10_001);
    assert_eq!(credits(&engine, "doomed"), 10_000);
    assert_eq!(engine.tick(), 1);
}

#[tokio::test]
async fn panicking_unit_is_contained() {
    let mut engine = Engine::builder()
        .catalog(saboteur_catalog("doomed", Misbehavior::Panic))
        .build();
    with_humans(&mut engine, &["doomed", "healthy"]).await;

    let report = engine.process_tick().await.unwrap();

    assert!(matches!(
        &report.failures[0].kind,
        FailureKind::Panicked(msg) if msg == "unit exploded"
    ));
    assert_eq!(credits(&engine, "healthy"), 10_001);
}

#[tokio::test(start_paused = true)]
async fn hanging_unit_times_out_without_stalling_the_tick() {
    let config = EngineConfig {
        unit_timeout_ms: 50,
        ..EngineConfig::default()
    };
    let mut engine = Engine::builder()
        .config(config)
        .catalog(saboteur_catalog("doomed", Misbehavior::Hang))
        .build();
    with_humans(&mut engine, &["doomed", "healthy"]).await;

    let report = engine.process_tick().await.unwrap();

    assert_eq!(report.failures[0].kind, FailureKind::TimedOut(50));
    assert_eq!(credits(&engine, "healthy"), 10_001);
    assert_eq!(credits(&engine, "doomed"), 10_000);
}

#[tokio::test(start_paused = true)]
async fn hanging_ai_module_times_out_while_others_still_decide() {
    let recorder = Recorder::default();
    let modules = recorder.clone();
    let config = EngineConfig {
        ai_module_timeout_ms: 50,
        ..EngineConfig::default()
    };
    let catalog = UnitCatalog::new()
        .ai(AiDomain::Political, move |_| Box::new(Probe::new("ai", &modules)))
        .ai(AiDomain::Military, |_| Box::new(StalledAdvisor));
    let mut engine = Engine::builder().config(config).catalog(catalog).build();
    engine
        .register_player(PlayerDescriptor::ai("Hal").with_civilization("orion"))
        .await
        .unwrap();

    let report = engine.process_tick().await.unwrap();

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.phase, Phase::AiDecision);
    assert_eq!(failure.unit, "stalled");
    assert_eq!(failure.civilization, Some(CivilizationId::from("orion")));
    assert_eq!(failure.kind, FailureKind::TimedOut(50));

    assert_eq!(report.ai_actions_queued, 1);
    assert_eq!(engine.actions().len(), 1);
    assert_eq!(recorder.entries(), vec!["ai@0"]);
    assert_eq!(engine.tick(), 1);
}

#[tokio::test]
async fn ai_actions_wait_for_the_next_tick() {
    let recorder = Recorder::default();
    let claims = recorder.clone();
    let modules = recorder.clone();
    let catalog = UnitCatalog::new()
        .civilization(CivilizationDomain::Diplomacy, move |_| {
            Box::new(ProbeClaimer {
                recorder: claims.clone(),
            })
        })
        .ai(AiDomain::Political, move |_| Box::new(Probe::new("ai", &modules)));
    let mut engine = Engine::builder().catalog(catalog).build();
    engine
        .register_player(PlayerDescriptor::ai("Hal").with_civilization("orion"))
        .await
        .unwrap();

    engine.process_tick().await.unwrap();

    // Generated at tick 0: queued, but not claimable until tick 1.
    assert_eq!(engine.actions().len(), 1);
    assert_eq!(engine.actions().claimable(0).count(), 0);
    assert_eq!(engine.actions().claimable(1).count(), 1);
    assert!(!recorder.entries().iter().any(|e| e.starts_with("claimed")));

    engine.process_tick().await.unwrap();

    assert!(recorder.entries().contains(&"claimed 1@1".to_string()));
    // Tick 1's own proposal is waiting for tick 2.
    assert_eq!(engine.actions().len(), 1);
    assert_eq!(engine.actions().iter().next().unwrap().eligible_tick, 2);
}

#[tokio::test]
async fn queued_ai_actions_are_dropped_when_their_player_leaves() {
    let recorder = Recorder::default();
    let claims = recorder.clone();
    let modules = recorder.clone();
    let catalog = UnitCatalog::new()
        .interaction(InteractionDomain::Diplomacy, move || {
            Box::new(ProbeClaimer {
                recorder: claims.clone(),
            })
        })
        .ai(AiDomain::Political, move |_| Box::new(Probe::new("ai", &modules)));
    let mut engine = Engine::builder().catalog(catalog).build();
    let hal = engine
        .register_player(PlayerDescriptor::ai("Hal").with_civilization("orion"))
        .await
        .unwrap();
    engine.process_tick().await.unwrap();
    assert_eq!(engine.actions().len(), 1);

    engine.deregister_player(&hal.id).await.unwrap();
    let mut events = engine.subscribe();
    let report = engine.process_tick().await.unwrap();

    assert_eq!(report.actions_rejected, 1);
    assert_eq!(report.actions_claimed, 0);
    assert!(engine.actions().is_empty());
    assert!(!recorder.entries().iter().any(|e| e.starts_with("claimed")));
    let mut rejected = false;
    while let Ok(event) = events.try_recv() {
        rejected |= event.kind == EventKind::ActionsRejected;
    }
    assert!(rejected);
}

#[tokio::test]
async fn queued_ai_actions_are_dropped_after_hand_back() {
    let recorder = Recorder::default();
    let claims = recorder.clone();
    let modules = recorder.clone();
    let catalog = UnitCatalog::new()
        .civilization(CivilizationDomain::Diplomacy, move |_| {
            Box::new(ProbeClaimer {
                recorder: claims.clone(),
            })
        })
        .ai(AiDomain::Political, move |_| Box::new(Probe::new("ai", &modules)));
    let config = EngineConfig {
        disconnect_grace_ticks: 0,
        ..EngineConfig::default()
    };
    let mut engine = Engine::builder().config(config).catalog(catalog).build();
    with_humans(&mut engine, &["solace"]).await;
    let ruler = PlayerId::from("p-solace");

    engine.disconnect_player(&ruler).unwrap();
    let report = engine.process_tick().await.unwrap();
    assert_eq!(report.takeovers, 1);
    assert_eq!(report.ai_actions_queued, 1);

    engine.reconnect_player(&ruler).await.unwrap();
    let report = engine.process_tick().await.unwrap();

    assert_eq!(report.actions_rejected, 1);
    assert!(engine.actions().is_empty());
    assert!(!recorder.entries().iter().any(|e| e.starts_with("claimed")));
}

#[tokio::test]
async fn rejected_change_list_is_discarded_whole() {
    let catalog =
        UnitCatalog::new().civilization(CivilizationDomain::Military, |_| Box::new(Overreach));
    let mut engine = Engine::builder().catalog(catalog).build();
    with_humans(&mut engine, &["solace"]).await;

    let report = engine.process_tick().await.unwrap();

    assert!(matches!(report.failures[0].kind, FailureKind::ChangeRejected(_)));
    let civ = engine.civilizations().get(&CivilizationId::from("solace")).unwrap();
    assert_eq!(civ.resources.get(Resource::Credits), 10_000);
    assert_eq!(civ.territory.len(), 1);
}

#[tokio::test]
async fn repeated_failures_flag_for_review_but_keep_running() {
    let config = EngineConfig {
        failure_review_threshold: 2,
        ..EngineConfig::default()
    };
    let mut engine = Engine::builder()
        .config(config)
        .catalog(saboteur_catalog("doomed", Misbehavior::Fail))
        .build();
    with_humans(&mut engine, &["doomed", "healthy"]).await;
    let doomed = CivilizationId::from("doomed");
    let mut events = engine.subscribe();

    let first = engine.process_tick().await.unwrap();
    assert!(first.flagged.is_empty());
    let second = engine.process_tick().await.unwrap();
    assert_eq!(second.flagged, vec![doomed.clone()]);

    assert_eq!(engine.flagged_for_review(), vec![doomed.clone()]);
    assert!(engine.civilizations().get(&doomed).unwrap().active);
    assert!(engine
        .get_game_lobby_state()
        .civilizations
        .iter()
        .any(|c| c.id == doomed && c.flagged_for_review));

    let mut flagged_event = false;
    while let Ok(event) = events.try_recv() {
        flagged_event |= event.kind == EventKind::CivilizationFlaggedForReview;
    }
    assert!(flagged_event);

    assert!(engine.clear_review_flag(&doomed).unwrap());
    assert!(engine.flagged_for_review().is_empty());
}

#[tokio::test]
async fn unclaimed_actions_expire() {
    let config = EngineConfig {
        stale_action_ticks: 1,
        ..EngineConfig::default()
    };
    let mut engine = Engine::builder().config(config).build();
    with_humans(&mut engine, &["solace"]).await;
    let mut events = engine.subscribe();

    engine
        .submit_action(&PlayerId::from("p-solace"), ActionRequest::new("trade"))
        .unwrap();

    let mut expired = 0;
    for _ in 0..3 {
        expired += engine.process_tick().await.unwrap().actions_expired;
    }

    assert_eq!(expired, 1);
    assert!(engine.actions().is_empty());
    let mut seen = false;
    while let Ok(event) = events.try_recv() {
        seen |= event.kind == EventKind::ActionsExpired;
    }
    assert!(seen);
}

#[tokio::test]
async fn reference_catalog_runs_a_galaxy() {
    let mut engine = Engine::builder()
        .catalog(galaxy_core::units::builtin::reference_catalog(42))
        .build();
    for i in 0..3 {
        engine
            .register_player(PlayerDescriptor::ai(format!("AI {i}")).with_civilization(format!("ai-{i}")))
            .await
            .unwrap();
    }
    engine.start().unwrap();

    for _ in 0..5 {
        let report = engine.process_tick().await.unwrap();
        assert!(report.failures.is_empty(), "{:?}", report.failures);
    }

    assert_eq!(engine.shared().galactic_day, 5);
    assert_eq!(engine.metrics().ticks_processed, 5);
    assert!(engine.metrics().ai_calls > 0);
    assert_eq!(credits(&engine, "ai-0"), 10_050);
    assert_eq!(
        engine.systems_of(&CivilizationId::from("ai-0")),
        vec!["economy", "military", "research"]
    );
}

#[tokio::test]
async fn ended_game_refuses_ticks() {
    let mut engine = Engine::builder().build();
    engine.end().await.unwrap();
    assert!(matches!(
        engine.process_tick().await,
        Err(galaxy_core::EngineError::GameEnded)
    ));
}
