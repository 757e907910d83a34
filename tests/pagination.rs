//! End-to-end pagination behavior against a real SQLite store.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use emission_registry::error::{RegistryError, SearchError, ValidationError};
use emission_registry::query::VehicleFilter;
use emission_registry::store::SqliteStore;
use emission_registry::types::{
    DEFAULT_LIMIT, Direction, MAX_LIMIT, NewEmissionTest, NewVehicle, Page, PageCursor,
    PageRequest, Vehicle,
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

fn vehicle_at(plate: &str, offset_secs: i64) -> NewVehicle {
    NewVehicle {
        plate_number: plate.to_string(),
        chassis_number: Some(format!("CH-{}", plate)),
        registration_number: Some(format!("REG-{}", plate)),
        driver_name: "Juan dela Cruz".to_string(),
        office_id: Uuid::nil(),
        office_name: "City ENRO".to_string(),
        vehicle_type: "Truck".to_string(),
        engine_type: "Diesel".to_string(),
        wheels: 6,
        created_at: Some(base_time() + Duration::seconds(offset_secs)),
    }
}

/// Inserts vehicles A(T1)..E(T5) so that E is the newest record.
fn seed_five(store: &SqliteStore) -> Vec<Vehicle> {
    ["A", "B", "C", "D", "E"]
        .iter()
        .enumerate()
        .map(|(i, plate)| store.insert_vehicle(vehicle_at(plate, i as i64)).unwrap())
        .collect()
}

fn plates(page: &Page<Vehicle>) -> Vec<String> {
    page.items.iter().map(|v| v.plate_number.clone()).collect()
}

fn cursor_for(vehicle: &Vehicle) -> String {
    PageCursor::new(vehicle.created_at, vehicle.id).encode()
}

#[test]
fn empty_store_yields_empty_page() {
    let store = SqliteStore::in_memory().unwrap();

    let page = store
        .fetch_page(&VehicleFilter::any(), &PageRequest::new())
        .unwrap();

    assert!(page.is_empty());
    assert!(page.next_cursor.is_none());
    assert!(page.prev_cursor.is_none());
}

#[test]
fn first_page_is_newest_first() {
    let store = SqliteStore::in_memory().unwrap();
    seed_five(&store);

    let page = store
        .fetch_page(&VehicleFilter::any(), &PageRequest::new().with_limit(2))
        .unwrap();

    assert_eq!(plates(&page), vec!["E", "D"]);
    assert!(page.next_cursor.is_some());
    assert!(page.prev_cursor.is_none());
}

#[test]
fn concrete_scenario_forward_and_backward() {
    let store = SqliteStore::in_memory().unwrap();
    let seeded = seed_five(&store);
    let (b, c, d) = (&seeded[1], &seeded[2], &seeded[3]);

    // fetch_page(limit=2) -> [E, D], next = encode(D), prev = null
    let page1 = store
        .fetch_page(&VehicleFilter::any(), &PageRequest::new().with_limit(2))
        .unwrap();
    assert_eq!(plates(&page1), vec!["E", "D"]);
    assert_eq!(page1.next_cursor.as_deref(), Some(cursor_for(d).as_str()));
    assert!(page1.prev_cursor.is_none());

    // fetch_page(limit=2, after=encode(D)) -> [C, B], next = encode(B), prev = encode(C)
    let page2 = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new().with_limit(2).with_after(cursor_for(d)),
        )
        .unwrap();
    assert_eq!(plates(&page2), vec!["C", "B"]);
    assert_eq!(page2.next_cursor.as_deref(), Some(cursor_for(b).as_str()));
    assert_eq!(page2.prev_cursor.as_deref(), Some(cursor_for(c).as_str()));

    // fetch_page(limit=2, before=encode(C)) -> [E, D], next = encode(D),
    // prev = null (nothing newer than E exists)
    let page3 = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new().with_limit(2).with_before(cursor_for(c)),
        )
        .unwrap();
    assert_eq!(plates(&page3), vec!["E", "D"]);
    assert_eq!(page3.next_cursor.as_deref(), Some(cursor_for(d).as_str()));
    assert!(page3.prev_cursor.is_none());
}

#[test]
fn last_page_has_no_next_cursor() {
    let store = SqliteStore::in_memory().unwrap();
    seed_five(&store);

    let page1 = store
        .fetch_page(&VehicleFilter::any(), &PageRequest::new().with_limit(3))
        .unwrap();
    let page2 = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new()
                .with_limit(3)
                .with_after(page1.next_cursor.unwrap()),
        )
        .unwrap();

    assert_eq!(plates(&page2), vec!["B", "A"]);
    assert!(page2.next_cursor.is_none());
    assert!(page2.prev_cursor.is_some());
}

#[test]
fn round_trip_cursor_returns_following_page() {
    let store = SqliteStore::in_memory().unwrap();
    let seeded = seed_five(&store);

    // For every record r, decoding encode(r) and using it as `after` yields
    // exactly the records ordered strictly after r.
    for (i, vehicle) in seeded.iter().enumerate() {
        let token = cursor_for(vehicle);
        let decoded = PageCursor::decode(&token).unwrap();
        assert_eq!(decoded.created_at(), vehicle.created_at);
        assert_eq!(decoded.id(), vehicle.id);

        let page = store
            .fetch_page(
                &VehicleFilter::any(),
                &PageRequest::new().with_limit(10).with_after(token),
            )
            .unwrap();

        let expected: Vec<String> = seeded[..i]
            .iter()
            .rev()
            .map(|v| v.plate_number.clone())
            .collect();
        assert_eq!(plates(&page), expected);
    }
}

#[test]
fn conflicting_cursors_are_rejected() {
    let store = SqliteStore::in_memory().unwrap();
    let seeded = seed_five(&store);
    let token = cursor_for(&seeded[2]);

    let result = store.fetch_page(
        &VehicleFilter::any(),
        &PageRequest::new().with_after(&token).with_before(&token),
    );

    assert!(matches!(
        result,
        Err(RegistryError::Validation(ValidationError::ConflictingCursors))
    ));
}

#[test]
fn malformed_cursor_is_rejected() {
    let store = SqliteStore::in_memory().unwrap();
    seed_five(&store);

    let result = store.fetch_page(
        &VehicleFilter::any(),
        &PageRequest::new().with_after("!!not a cursor!!"),
    );

    assert!(matches!(
        result,
        Err(RegistryError::Search(SearchError::InvalidCursor { .. }))
    ));
}

#[test]
fn limit_is_clamped_not_rejected() {
    let store = SqliteStore::in_memory().unwrap();
    seed_five(&store);

    let page = store
        .fetch_page(&VehicleFilter::any(), &PageRequest::new().with_limit(0))
        .unwrap();
    assert_eq!(page.limit, DEFAULT_LIMIT);

    let page = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new().with_limit(MAX_LIMIT + 1),
        )
        .unwrap();
    assert_eq!(page.limit, MAX_LIMIT);

    let page = store
        .fetch_page(&VehicleFilter::any(), &PageRequest::new().with_limit(-7))
        .unwrap();
    assert_eq!(page.limit, DEFAULT_LIMIT);
}

#[test]
fn concurrent_insert_does_not_shift_pages() {
    let store = SqliteStore::in_memory().unwrap();
    seed_five(&store);

    let page1 = store
        .fetch_page(&VehicleFilter::any(), &PageRequest::new().with_limit(2))
        .unwrap();
    assert_eq!(plates(&page1), vec!["E", "D"]);

    // A writer inserts a record newer than everything while the reader is
    // between pages.
    store.insert_vehicle(vehicle_at("F", 100)).unwrap();

    let page2 = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new()
                .with_limit(2)
                .with_after(page1.next_cursor.unwrap()),
        )
        .unwrap();

    // Page 2 is the exact continuation: no repeats of page 1 and no skipped
    // rows, exactly as if the insert had not happened.
    assert_eq!(plates(&page2), vec!["C", "B"]);
}

#[test]
fn deleted_boundary_row_keeps_cursor_usable() {
    let store = SqliteStore::in_memory().unwrap();
    let seeded = seed_five(&store);
    let d = &seeded[3];

    let token = cursor_for(d);
    assert!(store.delete_vehicle(d.id).unwrap());

    // The comparison predicates are purely relational, so the page after the
    // now-deleted boundary is still exactly the records older than it.
    let page = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new().with_limit(2).with_after(token),
        )
        .unwrap();
    assert_eq!(plates(&page), vec!["C", "B"]);
}

#[test]
fn equal_timestamps_are_tiebroken_by_id() {
    let store = SqliteStore::in_memory().unwrap();

    // Five records sharing one timestamp; ordering falls back to id DESC.
    let mut inserted: Vec<Vehicle> = (0..5)
        .map(|i| {
            store
                .insert_vehicle(vehicle_at(&format!("T-{}", i), 0))
                .unwrap()
        })
        .collect();
    inserted.sort_by(|a, b| b.id.to_string().cmp(&a.id.to_string()));

    let page1 = store
        .fetch_page(&VehicleFilter::any(), &PageRequest::new().with_limit(2))
        .unwrap();
    let page2 = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new()
                .with_limit(2)
                .with_after(page1.next_cursor.clone().unwrap()),
        )
        .unwrap();
    let page3 = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new()
                .with_limit(2)
                .with_after(page2.next_cursor.clone().unwrap()),
        )
        .unwrap();

    let mut walked: Vec<Uuid> = Vec::new();
    for page in [&page1, &page2, &page3] {
        walked.extend(page.items.iter().map(|v| v.id));
    }
    let expected: Vec<Uuid> = inserted.iter().map(|v| v.id).collect();
    assert_eq!(walked, expected);
    assert!(page3.next_cursor.is_none());
}

#[test]
fn extra_row_trick_and_probe_agree_at_every_boundary() {
    let store = SqliteStore::in_memory().unwrap();
    let seeded = seed_five(&store);
    let filter = VehicleFilter::any();

    // The forward path derives "more" flags from the limit+1 trick while the
    // backward path uses the existence probe; at every boundary the two
    // mechanisms must agree.
    for vehicle in &seeded {
        let boundary = PageCursor::new(vehicle.created_at, vehicle.id);

        let after_page = store
            .fetch_page(
                &filter,
                &PageRequest::new().with_limit(1).with_after(cursor_for(vehicle)),
            )
            .unwrap();
        let probe_older = store.has_more(&filter, &boundary, Direction::Older).unwrap();
        assert_eq!(
            !after_page.is_empty(),
            probe_older,
            "older-side disagreement at {}",
            vehicle.plate_number
        );

        let before_page = store
            .fetch_page(
                &filter,
                &PageRequest::new().with_limit(1).with_before(cursor_for(vehicle)),
            )
            .unwrap();
        let probe_newer = store.has_more(&filter, &boundary, Direction::Newer).unwrap();
        assert_eq!(
            !before_page.is_empty(),
            probe_newer,
            "newer-side disagreement at {}",
            vehicle.plate_number
        );
    }
}

#[test]
fn before_mode_returns_nearest_newer_rows() {
    let store = SqliteStore::in_memory().unwrap();
    let seeded = seed_five(&store);
    let a = &seeded[0];

    // Before the oldest record with limit 2: the nearest newer rows are C, B,
    // not the newest rows E, D.
    let page = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new().with_limit(2).with_before(cursor_for(a)),
        )
        .unwrap();

    assert_eq!(plates(&page), vec!["C", "B"]);
    assert!(page.prev_cursor.is_some());
    // Older than B: only A, which the probe must find.
    assert!(page.next_cursor.is_some());
}

#[test]
fn before_newest_record_is_empty() {
    let store = SqliteStore::in_memory().unwrap();
    let seeded = seed_five(&store);
    let e = &seeded[4];

    let page = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new().with_limit(2).with_before(cursor_for(e)),
        )
        .unwrap();

    assert!(page.is_empty());
    assert!(page.next_cursor.is_none());
    assert!(page.prev_cursor.is_none());
}

#[test]
fn skip_translation_matches_naive_offset() {
    let store = SqliteStore::in_memory().unwrap();
    let seeded = seed_five(&store);

    // Full collection in browse order, for slicing out the expected window.
    let mut ordered: Vec<String> = seeded.iter().map(|v| v.plate_number.clone()).collect();
    ordered.reverse();

    for skip in 0..5 {
        let page = store
            .fetch_page(
                &VehicleFilter::any(),
                &PageRequest::new().with_limit(2).with_skip(skip),
            )
            .unwrap();

        let expected: Vec<String> = ordered
            .iter()
            .skip(skip as usize)
            .take(2)
            .cloned()
            .collect();
        assert_eq!(plates(&page), expected, "skip = {}", skip);
    }
}

#[test]
fn skip_past_end_is_an_empty_page() {
    let store = SqliteStore::in_memory().unwrap();
    seed_five(&store);

    let page = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new().with_limit(2).with_skip(99),
        )
        .unwrap();

    assert!(page.is_empty());
    assert!(page.next_cursor.is_none());
    assert!(page.prev_cursor.is_none());
}

#[test]
fn skip_is_ignored_when_a_cursor_is_present() {
    let store = SqliteStore::in_memory().unwrap();
    let seeded = seed_five(&store);
    let d = &seeded[3];

    let page = store
        .fetch_page(
            &VehicleFilter::any(),
            &PageRequest::new()
                .with_limit(2)
                .with_after(cursor_for(d))
                .with_skip(4),
        )
        .unwrap();

    // The cursor wins; skip is legacy-only.
    assert_eq!(plates(&page), vec!["C", "B"]);
}

#[test]
fn normalized_plate_filter_spans_pages() {
    let store = SqliteStore::in_memory().unwrap();

    for i in 0..4 {
        store
            .insert_vehicle(vehicle_at(&format!("ABC-{}", i), i))
            .unwrap();
    }
    for i in 0..3 {
        store
            .insert_vehicle(vehicle_at(&format!("XYZ-{}", i), 10 + i))
            .unwrap();
    }

    // Formatting differences must not cause misses: "abc" with no dash still
    // matches the dashed plates.
    let filter = VehicleFilter {
        plate_number: Some("abc".to_string()),
        ..Default::default()
    };

    let page1 = store
        .fetch_page(&filter, &PageRequest::new().with_limit(3))
        .unwrap();
    assert_eq!(plates(&page1), vec!["ABC-3", "ABC-2", "ABC-1"]);

    let page2 = store
        .fetch_page(
            &filter,
            &PageRequest::new()
                .with_limit(3)
                .with_after(page1.next_cursor.unwrap()),
        )
        .unwrap();
    assert_eq!(plates(&page2), vec!["ABC-0"]);
    assert!(page2.next_cursor.is_none());
}

#[test]
fn categorical_filter_is_exact() {
    let store = SqliteStore::in_memory().unwrap();
    store.insert_vehicle(vehicle_at("ONE", 1)).unwrap();

    let mut sedan = vehicle_at("TWO", 2);
    sedan.vehicle_type = "Sedan".to_string();
    store.insert_vehicle(sedan).unwrap();

    let filter = VehicleFilter {
        vehicle_type: Some("Sedan".to_string()),
        ..Default::default()
    };
    let page = store.fetch_page(&filter, &PageRequest::new()).unwrap();
    assert_eq!(plates(&page), vec!["TWO"]);

    // Substring of a category does not match.
    let filter = VehicleFilter {
        vehicle_type: Some("Sed".to_string()),
        ..Default::default()
    };
    let page = store.fetch_page(&filter, &PageRequest::new()).unwrap();
    assert!(page.is_empty());
}

#[test]
fn search_matches_identifiers_names_and_office() {
    let store = SqliteStore::in_memory().unwrap();

    let mut first = vehicle_at("NAA-1001", 1);
    first.driver_name = "Maria Santos".to_string();
    store.insert_vehicle(first).unwrap();

    let mut second = vehicle_at("ZZZ-9", 2);
    second.driver_name = "Pedro Reyes".to_string();
    second.office_name = "Provincial Capitol".to_string();
    store.insert_vehicle(second).unwrap();

    // Plate match, formatting-insensitive.
    let page = store.search_page("naa 1001", &PageRequest::new()).unwrap();
    assert_eq!(plates(&page), vec!["NAA-1001"]);

    // Driver name match.
    let page = store.search_page("santos", &PageRequest::new()).unwrap();
    assert_eq!(plates(&page), vec!["NAA-1001"]);

    // Office name match.
    let page = store.search_page("capitol", &PageRequest::new()).unwrap();
    assert_eq!(plates(&page), vec!["ZZZ-9"]);
}

#[test]
fn blank_search_matches_nothing() {
    let store = SqliteStore::in_memory().unwrap();
    seed_five(&store);

    let page = store.search_page("   ", &PageRequest::new()).unwrap();
    assert!(page.is_empty());
    assert!(page.next_cursor.is_none());
}

#[test]
fn search_pages_with_cursors() {
    let store = SqliteStore::in_memory().unwrap();
    for i in 0..5 {
        store
            .insert_vehicle(vehicle_at(&format!("DEF-{}", i), i))
            .unwrap();
    }

    let page1 = store
        .search_page("def", &PageRequest::new().with_limit(2))
        .unwrap();
    assert_eq!(plates(&page1), vec!["DEF-4", "DEF-3"]);

    let page2 = store
        .search_page(
            "def",
            &PageRequest::new()
                .with_limit(2)
                .with_after(page1.next_cursor.unwrap()),
        )
        .unwrap();
    assert_eq!(plates(&page2), vec!["DEF-2", "DEF-1"]);
    assert_eq!(
        page2.prev_cursor.as_deref(),
        Some(cursor_for(&page2.items[0]).as_str())
    );
}

#[test]
fn latest_test_enrichment_picks_most_recent_per_vehicle() {
    let store = SqliteStore::in_memory().unwrap();
    let seeded = seed_five(&store);
    let (a, b) = (&seeded[0], &seeded[1]);

    for (date, result) in [
        (NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(), false),
        (NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(), true),
        (NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), false),
    ] {
        store
            .insert_test(NewEmissionTest {
                vehicle_id: a.id,
                test_date: date,
                year: 2024,
                quarter: 2,
                result,
            })
            .unwrap();
    }
    store
        .insert_test(NewEmissionTest {
            vehicle_id: b.id,
            test_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            year: 2024,
            quarter: 2,
            result: false,
        })
        .unwrap();

    let mut page = store
        .fetch_page(&VehicleFilter::any(), &PageRequest::new())
        .unwrap();
    store.attach_latest_tests(&mut page.items).unwrap();

    let by_plate = |plate: &str| {
        page.items
            .iter()
            .find(|v| v.plate_number == plate)
            .unwrap()
            .clone()
    };

    let latest_a = by_plate("A").latest_test.unwrap();
    assert_eq!(
        latest_a.test_date,
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    );
    assert!(latest_a.result);

    let latest_b = by_plate("B").latest_test.unwrap();
    assert!(!latest_b.result);

    // Vehicles without any test stay unenriched.
    assert!(by_plate("E").latest_test.is_none());
}

#[test]
fn file_backed_store_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        seed_five(&store);
    }

    // Reopen and keep paginating across process lifetimes.
    let store = SqliteStore::open(&path).unwrap();
    let page = store
        .fetch_page(&VehicleFilter::any(), &PageRequest::new().with_limit(2))
        .unwrap();
    assert_eq!(plates(&page), vec!["E", "D"]);
}
