use galaxy_core::units::builtin::reference_catalog;
use galaxy_core::{
    CivilizationId, CivilizationView, Engine, EngineError, PlayerDescriptor, PlayerId,
};

async fn two_rulers() -> Engine {
    let mut engine = Engine::builder().catalog(reference_catalog(3)).build();
    for (player, civ) in [("p1", "solace"), ("p2", "vega")] {
        engine
            .register_player(
                PlayerDescriptor::human(player)
                    .with_id(player)
                    .with_civilization(civ),
            )
            .await
            .unwrap();
    }
    engine
}

#[tokio::test]
async fn views_are_stable_between_ticks() {
    let engine = two_rulers().await;
    let solace = CivilizationId::from("solace");
    let p2 = PlayerId::from("p2");

    let first = engine.get_civilization_game_state(&solace, &p2).unwrap();
    let second = engine.get_civilization_game_state(&solace, &p2).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn owner_sees_everything_and_others_see_public_fields() {
    let mut engine = two_rulers().await;
    engine.initialize().await;
    let solace = CivilizationId::from("solace");

    let own = engine
        .get_civilization_game_state(&solace, &PlayerId::from("p1"))
        .unwrap();
    let CivilizationView::Full(full) = &own else {
        panic!("owner should get the full view, got {own:?}");
    };
    assert_eq!(full.civilization.id, solace);
    assert_eq!(full.systems, vec!["economy", "military", "research"]);

    let foreign = engine
        .get_civilization_game_state(&solace, &PlayerId::from("p2"))
        .unwrap();
    assert!(!foreign.is_full());
    let json = serde_json::to_value(&foreign).unwrap();
    assert_eq!(json["view"], "public");
    for private in ["resources", "military", "technology", "ai_state", "secret_projects"] {
        assert!(json.get(private).is_none(), "{private} leaked into public view");
    }
    assert!(json["territory"].as_array().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn observers_get_the_observer_view() {
    let mut engine = two_rulers().await;
    let eve = engine
        .register_player(PlayerDescriptor::observer("Eve"))
        .await
        .unwrap();

    let view = engine
        .get_civilization_game_state(&CivilizationId::from("vega"), &eve.id)
        .unwrap();

    assert!(matches!(view, CivilizationView::Observer(_)));
    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("resources").is_none());
    assert_eq!(
        engine.public_view(&CivilizationId::from("vega")).unwrap().public(),
        view.public()
    );
}

#[tokio::test]
async fn unknown_requester_or_civilization_is_an_error() {
    let engine = two_rulers().await;

    assert_eq!(
        engine.get_civilization_game_state(&CivilizationId::from("vega"), &PlayerId::from("nobody")),
        Err(EngineError::UnknownPlayer(PlayerId::from("nobody")))
    );
    assert_eq!(
        engine.get_civilization_game_state(&CivilizationId::from("nowhere"), &PlayerId::from("p1")),
        Err(EngineError::UnknownCivilization(CivilizationId::from("nowhere")))
    );
}

#[tokio::test]
async fn player_state_bundles_own_and_foreign_views() {
    let mut engine = two_rulers().await;
    engine.process_tick().await.unwrap();

    let state = engine.get_player_game_state(&PlayerId::from("p1")).unwrap();

    assert_eq!(state.tick, 1);
    assert_eq!(state.galactic_day, 1);
    assert!(state.civilization.as_ref().is_some_and(CivilizationView::is_full));
    assert_eq!(state.others.len(), 1);
    assert!(state.others.iter().all(|v| !v.is_full()));
    assert_eq!(state.metrics.ticks_processed, 1);
}
