use horizon_kernel::{
    Application, ApplicationResourceIdentifier, BoundedContext, EventSequenceNumber, EventSourceId,
};
use horizon_persistence::sequence::SEQUENCE_FILE_NAME;
use horizon_persistence::{DiskFiles, EventSequenceNumbers, Files, PersistenceError, SequenceGenerator};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn source(n: u128) -> ApplicationResourceIdentifier {
    ApplicationResourceIdentifier::for_event_source(
        Application::from_u128(0xA),
        BoundedContext::from_u128(0xB),
        EventSourceId::from_u128(n),
    )
}

#[test]
fn test_sequential_calls_are_monotonic() {
    let dir = tempdir().unwrap();
    let generator = SequenceGenerator::new(DiskFiles, dir.path()).unwrap();

    let values: Vec<u64> = (0..10).map(|_| generator.next().unwrap().0).collect();
    assert_eq!(values, (1..=10).collect::<Vec<u64>>());
}

#[test]
fn test_concurrent_callers_receive_distinct_gap_free_values() {
    let dir = tempdir().unwrap();
    let generator = Arc::new(SequenceGenerator::new(DiskFiles, dir.path()).unwrap());
    let id = source(1);

    let threads = 8;
    let per_thread = 25;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let generator = generator.clone();
            thread::spawn(move || {
                (0..per_thread)
                    .map(|_| generator.next_for_type(&id).unwrap().0)
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for value in handle.join().unwrap() {
            assert!(seen.insert(value), "value {} handed out twice", value);
        }
    }

    let total = (threads * per_thread) as u64;
    assert_eq!(seen.len() as u64, total);
    assert_eq!(seen, (1..=total).collect::<HashSet<u64>>());
}

#[test]
fn test_counters_survive_restart() {
    let dir = tempdir().unwrap();
    let id = source(2);

    {
        let generator = SequenceGenerator::new(DiskFiles, dir.path()).unwrap();
        for _ in 0..3 {
            generator.next().unwrap();
        }
        generator.next_for_type(&id).unwrap();
    }

    let generator = SequenceGenerator::new(DiskFiles, dir.path()).unwrap();
    assert_eq!(generator.next().unwrap(), EventSequenceNumber(4));
    assert_eq!(generator.next_for_type(&id).unwrap(), EventSequenceNumber(2));
}

#[test]
fn test_counters_are_independent() {
    let dir = tempdir().unwrap();
    let generator = SequenceGenerator::new(DiskFiles, dir.path()).unwrap();
    let a = source(0xA1);
    let b = source(0xB1);

    assert_eq!(generator.next_for_type(&a).unwrap(), EventSequenceNumber(1));
    assert_eq!(generator.next_for_type(&a).unwrap(), EventSequenceNumber(2));
    assert_eq!(generator.next_for_type(&a).unwrap(), EventSequenceNumber(3));
    assert_eq!(generator.next_for_type(&b).unwrap(), EventSequenceNumber(1));

    // Global counter untouched by typed counters
    assert_eq!(generator.next().unwrap(), EventSequenceNumber(1));
}

#[test]
fn test_counter_files_use_stable_names() {
    let dir = tempdir().unwrap();
    let generator = SequenceGenerator::new(DiskFiles, dir.path()).unwrap();
    let id = source(3);

    generator.next().unwrap();
    generator.next_for_type(&id).unwrap();

    assert!(dir.path().join(SEQUENCE_FILE_NAME).is_file());
    let typed = format!("sequence_for_{}", id);
    assert!(dir.path().join(&typed).is_file());
    assert_eq!(DiskFiles.read_string(dir.path(), &typed).unwrap(), "1");
}

#[test]
fn test_corrupt_counter_is_reported() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(SEQUENCE_FILE_NAME), "not a number").unwrap();
    let generator = SequenceGenerator::new(DiskFiles, dir.path()).unwrap();

    let err = generator.next().unwrap_err();
    assert!(matches!(err, PersistenceError::CorruptState { .. }));
    assert_eq!(
        std::fs::read_to_string(dir.path().join(SEQUENCE_FILE_NAME)).unwrap(),
        "not a number"
    );
}

#[test]
fn test_missing_location_is_a_configuration_error() {
    let result = SequenceGenerator::new(DiskFiles, "");
    assert!(matches!(result, Err(PersistenceError::Configuration)));
}
