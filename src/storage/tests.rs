use super::*;
use crate::Entity;

fn entity(raw: u32) -> Entity { Entity::new(raw).expect("nonzero test entity") }

fn collect(table: &Table<i64>) -> Vec<(u32, i64)> {
    table.iter().map(|(entity, &value)| (entity.get(), value)).collect()
}

#[test]
fn test_add_then_get() {
    let mut table = Table::new();
    for raw in [1, 15, 16, 300, 17, 2] {
        table.add(entity(raw), i64::from(raw) * 10);
    }

    for raw in [1, 15, 16, 300, 17, 2] {
        assert_eq!(table.get(entity(raw)), Some(&(i64::from(raw) * 10)));
    }
    assert_eq!(table.get(entity(3)), None);
    assert_eq!(table.get(entity(299)), None);
    assert_eq!(table.cardinality(), 6);
    assert_eq!(table.page_count(), 3, "pages 0, 16 and 288");
    assert_eq!(
        collect(&table),
        vec![(1, 10), (2, 20), (15, 150), (16, 160), (17, 170), (300, 3000)],
        "iteration must follow entity order regardless of insertion order",
    );
}

#[test]
fn test_change_flag_on_occupancy_only() {
    let mut table = Table::new();
    assert!(!table.has_changed());

    table.add(entity(5), 1);
    assert!(table.take_changed());
    assert!(!table.has_changed());

    *table.add(entity(5), 2) += 1;
    assert_eq!(table.get(entity(5)), Some(&3));
    assert!(!table.has_changed(), "overwriting an occupied slot must not flag the table");
    assert!(table.is_dirty(entity(5)));

    assert_eq!(table.remove(entity(6)), None);
    assert!(!table.has_changed(), "removing an absent value must not flag the table");

    assert_eq!(table.remove(entity(5)), Some(3));
    assert!(table.has_changed());
}

#[test]
fn test_remove_keeps_dirty_until_clean_up() {
    let mut table = Table::new();
    table.add(entity(20), 7);
    table.add(entity(40), 8);
    table.clean_up_pages();
    assert!(!table.is_dirty(entity(20)));

    assert_eq!(table.remove(entity(20)), Some(7));
    assert_eq!(table.get(entity(20)), None);
    assert!(table.is_dirty(entity(20)));
    assert_eq!(table.iter_dirty().collect::<Vec<_>>(), vec![entity(20)]);
    assert_eq!(table.page_count(), 2, "empty pages are kept until clean-up");

    assert_eq!(table.clean_up_pages(), 1);
    assert_eq!(table.page_count(), 1);
    assert!(!table.is_dirty(entity(20)));
    assert_eq!(table.iter_dirty().count(), 0);
    assert_eq!(collect(&table), vec![(40, 8)]);
}

#[test]
fn test_iter_mut() {
    let mut table = Table::new();
    for raw in [3, 33, 34] {
        table.add(entity(raw), 1);
    }
    for (entity, value) in table.iter_mut() {
        *value += i64::from(entity.get());
    }
    assert_eq!(collect(&table), vec![(3, 4), (33, 34), (34, 35)]);
}

#[test]
fn test_seek() {
    let mut table = Table::new();
    for raw in [2, 9, 40, 47, 100] {
        table.add(entity(raw), 0);
    }
    fn seek(table: &Table<i32>, start_page: usize, from: u32, dirty_only: bool) -> Option<u32> {
        table.seek(start_page, entity(from), dirty_only).map(|pos| table.entity_at(pos).get())
    }

    assert_eq!(seek(&table, 0, 1, false), Some(2));
    assert_eq!(seek(&table, 0, 3, false), Some(9));
    assert_eq!(seek(&table, 0, 10, false), Some(40), "skips to the next page");
    assert_eq!(seek(&table, 0, 20, false), Some(40), "page 16 does not exist");
    assert_eq!(seek(&table, 1, 48, false), Some(100));
    assert_eq!(seek(&table, 0, 101, false), None);
    assert_eq!(seek(&table, 5, 1, false), None);

    table.clean_up_pages();
    table.remove(entity(40));
    assert_eq!(seek(&table, 0, 1, true), Some(40));
    assert_eq!(seek(&table, 0, 41, true), None);

    let pos = table.seek(0, entity(41), false).expect("47 is occupied");
    assert_eq!(table.get_at(pos), Some(&0));
}

#[test]
fn test_clear() {
    let mut table = Table::new();
    table.clear();
    assert!(!table.has_changed());

    table.add(entity(1), 1);
    table.take_changed();
    table.clear();
    assert!(table.has_changed());
    assert!(table.is_empty());
    assert_eq!(table.page_count(), 0);
}

#[test]
fn test_values_are_dropped() {
    use std::sync::Arc;

    let counter = Arc::new(());
    let mut table = Table::new();
    table.add(entity(1), Arc::clone(&counter));
    table.add(entity(2), Arc::clone(&counter));
    table.add(entity(1), Arc::clone(&counter));
    assert_eq!(Arc::strong_count(&counter), 3);

    drop(table.remove(entity(2)));
    assert_eq!(Arc::strong_count(&counter), 2);

    drop(table);
    assert_eq!(Arc::strong_count(&counter), 1);
}
