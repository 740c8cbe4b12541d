//! Ownership checks and claim removal.

mod common;

use claimguard::{ActionKind, Coordinate};
use common::{new_player, new_world, TestFixture};
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[test]
fn test_unclaimed_world_never_blocks() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let spot = Coordinate::new(new_world(), 12, 70, -4);

    for radius in [0, 1, 8, 32, 65, 1_000] {
        assert_eq!(registry.check_owner(spot, radius, None).wait().unwrap(), None);
        assert_eq!(
            registry
                .check_owner(spot, radius, Some(new_player()))
                .wait()
                .unwrap(),
            None
        );
    }
}

#[test]
fn test_temporary_claim_never_blocks() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let owner = new_player();
    let spot = Coordinate::new(new_world(), 0, 64, 0);

    let placement = registry.record_placement(owner, spot).wait().unwrap();
    assert!(placement.temporary);

    assert_eq!(registry.check_owner(spot, 0, None).wait().unwrap(), None);
    assert_eq!(
        registry.check_owner(spot, 32, Some(new_player())).wait().unwrap(),
        None
    );

    // Age does not matter either
    fixture.seed_claim(owner, spot.offset(1, 0, 0), fixture.now() - 100 * 86_400_000, true);
    assert_eq!(registry.check_owner(spot, 5, None).wait().unwrap(), None);
}

#[test]
fn test_permanent_claim_blocks_others_in_range() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let owner = new_player();
    let claimed = Coordinate::new(new_world(), 100, 64, 100);
    fixture.seed_claim(owner, claimed, fixture.now(), false);

    let intruder = Some(new_player());
    assert_eq!(
        registry
            .check_owner(claimed.offset(8, -8, 8), 8, intruder)
            .wait()
            .unwrap(),
        Some(owner)
    );
    // One block outside the box
    assert_eq!(
        registry
            .check_owner(claimed.offset(9, 0, 0), 8, intruder)
            .wait()
            .unwrap(),
        None
    );
    // Negative radius covers the same box
    assert_eq!(
        registry
            .check_owner(claimed.offset(-8, 0, 0), -8, intruder)
            .wait()
            .unwrap(),
        Some(owner)
    );
}

#[test]
fn test_claim_only_blocks_its_own_world() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let claimed = Coordinate::new(new_world(), 0, 0, 0);
    fixture.seed_claim(new_player(), claimed, fixture.now(), false);

    let same_spot_elsewhere = Coordinate::new(new_world(), 0, 0, 0);
    assert_eq!(
        registry
            .check_owner(same_spot_elsewhere, 65, None)
            .wait()
            .unwrap(),
        None
    );
}

#[test]
fn test_expiry_boundary_is_inclusive() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let owner = new_player();
    let claimed = Coordinate::new(new_world(), 5, 5, 5);
    let placed_at = fixture.now();
    fixture.seed_claim(owner, claimed, placed_at, false);

    let window = registry.settings().protection_window_millis();
    assert_eq!(window, 10 * DAY.as_millis() as i64);

    fixture.clock.set(placed_at + window);
    assert_eq!(
        registry.check_owner(claimed, 0, None).wait().unwrap(),
        Some(owner),
        "claim exactly PROTECTION_DAYS old still protects"
    );

    fixture.clock.set(placed_at + window + 1);
    assert_eq!(
        registry.check_owner(claimed, 0, None).wait().unwrap(),
        None,
        "claim older than PROTECTION_DAYS no longer protects"
    );
}

#[test]
fn test_owner_is_never_blocked_by_own_claim() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let owner = new_player();
    let claimed = Coordinate::new(new_world(), 0, 64, 0);
    fixture.seed_claim(owner, claimed, fixture.now(), false);

    for kind in [ActionKind::Read, ActionKind::Write] {
        assert_eq!(
            registry.check_owner_for(kind, claimed, Some(owner)).wait().unwrap(),
            None
        );
    }
}

#[test]
fn test_grantee_is_not_blocked_but_grantor_still_is() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let access = &fixture.service.access;
    let (alice, bob) = (new_player(), new_player());
    let world = new_world();
    let alices_block = Coordinate::new(world, 0, 64, 0);
    let bobs_block = Coordinate::new(world, 2, 64, 0);
    fixture.seed_claim(alice, alices_block, fixture.now(), false);
    fixture.seed_claim(bob, bobs_block, fixture.now(), false);

    assert!(access.grant(alice, bob).wait().unwrap());

    // Bob may touch Alice's block, but Alice may not touch Bob's
    assert_eq!(
        registry
            .check_owner(alices_block, 0, Some(bob))
            .wait()
            .unwrap(),
        None
    );
    assert_eq!(
        registry
            .check_owner(bobs_block, 0, Some(alice))
            .wait()
            .unwrap(),
        Some(bob)
    );
}

#[test]
fn test_someone_else_still_blocks_a_grantee() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let (alice, bob, carol) = (new_player(), new_player(), new_player());
    let world = new_world();
    fixture.seed_claim(alice, Coordinate::new(world, 0, 0, 0), fixture.now(), false);
    fixture.seed_claim(carol, Coordinate::new(world, 1, 0, 0), fixture.now(), false);
    fixture.service.access.grant(alice, bob).wait().unwrap();

    assert_eq!(
        registry
            .check_owner(Coordinate::new(world, 0, 0, 0), 3, Some(bob))
            .wait()
            .unwrap(),
        Some(carol)
    );
}

#[test]
fn test_natural_action_is_blocked_by_any_active_claim() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let owner = new_player();
    let claimed = Coordinate::new(new_world(), 0, 64, 0);
    fixture.seed_claim(owner, claimed, fixture.now(), false);

    assert_eq!(
        registry
            .check_owner_for_natural_action(claimed.offset(8, 0, 0))
            .wait()
            .unwrap(),
        Some(owner)
    );
    assert_eq!(
        registry
            .check_owner_for_natural_action(claimed.offset(9, 0, 0))
            .wait()
            .unwrap(),
        None
    );
    // The owner does not exempt a natural effect
    assert_eq!(
        registry
            .check_owner_for(ActionKind::Natural, claimed, Some(owner))
            .wait()
            .unwrap(),
        Some(owner)
    );
}

#[test]
fn test_read_and_write_use_their_radii() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let owner = new_player();
    let intruder = Some(new_player());
    let claimed = Coordinate::new(new_world(), 0, 64, 0);
    fixture.seed_claim(owner, claimed, fixture.now(), false);

    let at_40 = claimed.offset(40, 0, 0);
    assert_eq!(registry.check_owner_for_read(at_40, intruder).wait().unwrap(), None);
    assert_eq!(
        registry.check_owner_for_write(at_40, intruder).wait().unwrap(),
        Some(owner)
    );
    assert_eq!(
        registry
            .check_owner_for_write(claimed.offset(0, 66, 0), intruder)
            .wait()
            .unwrap(),
        None
    );
}

#[test]
fn test_remove_one_is_unconditional() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let claimed = Coordinate::new(new_world(), 3, 3, 3);
    fixture.seed_claim(new_player(), claimed, fixture.now(), false);

    assert!(registry.remove_one(claimed).wait().unwrap());
    assert!(!registry.remove_one(claimed).wait().unwrap());
    assert_eq!(registry.claim_at(claimed).wait().unwrap(), None);
}

#[test]
fn test_remove_many_skips_missing_coordinates() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let world = new_world();
    let owner = new_player();
    let kept = Coordinate::new(world, 50, 0, 0);
    let doomed: Vec<_> = (0..4).map(|x| Coordinate::new(world, x, 0, 0)).collect();
    for coordinate in doomed.iter().chain([&kept]) {
        fixture.seed_claim(owner, *coordinate, fixture.now(), false);
    }

    let mut batch = doomed.clone();
    batch.insert(2, Coordinate::new(world, 99, 99, 99));
    let removed = registry.remove_many(batch).wait().unwrap();

    assert_eq!(removed, 4);
    assert_eq!(fixture.claim_count(), 1);
    assert!(registry.claim_at(kept).wait().unwrap().is_some());
}

#[test]
fn test_remove_many_with_empty_batch() {
    let fixture = TestFixture::new();
    let removed = fixture
        .service
        .registry
        .remove_many(Vec::new())
        .wait()
        .unwrap();
    assert_eq!(removed, 0);
}

#[test]
fn test_claims_within_lists_every_state() {
    let fixture = TestFixture::new();
    let registry = &fixture.service.registry;
    let owner = new_player();
    let center = Coordinate::new(new_world(), 0, 0, 0);
    fixture.seed_claim(owner, center, fixture.now(), false);
    fixture.seed_claim(owner, center.offset(1, 0, 0), fixture.now(), true);
    fixture.seed_claim(owner, center.offset(0, 0, 1), 0, false);
    fixture.seed_claim(owner, center.offset(10, 0, 0), fixture.now(), false);

    let claims = registry.claims_within(center, 2).wait().unwrap();
    assert_eq!(claims.len(), 3);
    assert!(claims.iter().all(|claim| claim.owner == owner));
    assert_eq!(claims.iter().filter(|claim| claim.temporary).count(), 1);
}
