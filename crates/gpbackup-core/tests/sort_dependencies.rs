use gpbackup_core::catalog::{Function, Relation, SortableObject, Table, UniqueId};
use gpbackup_core::sort::{topological_sort, Sortable};

fn make_function(oid: u32, name: &str) -> SortableObject {
    SortableObject::Function(Function {
        oid,
        schema: "public".to_string(),
        name: name.to_string(),
        ..Function::default()
    })
}

fn make_table(oid: u32, name: &str) -> SortableObject {
    SortableObject::Table(Table {
        relation: Relation::new(oid, "public", name),
        ..Table::default()
    })
}

fn depends(mut object: SortableObject, on: &[&SortableObject]) -> SortableObject {
    let deps: Vec<UniqueId> = on.iter().map(|o| o.unique_id()).collect();
    object.set_depends_upon(deps);
    object
}

fn names(sorted: &[SortableObject]) -> Vec<String> {
    sorted.iter().map(|o| o.fqn()).collect()
}

// ---- ordering

#[test]
fn independent_objects_keep_input_order() {
    let a = make_function(1, "a");
    let b = make_function(2, "b");
    let c = make_function(3, "c");

    let sorted = topological_sort(vec![a, b, c]).unwrap();
    assert_eq!(names(&sorted), ["public.a()", "public.b()", "public.c()"]);
}

#[test]
fn dependency_moves_after_its_target() {
    let b = make_function(2, "b");
    let c = make_function(3, "c");
    let a = depends(make_function(1, "a"), &[&c]);

    let sorted = topological_sort(vec![a, b, c]).unwrap();
    assert_eq!(names(&sorted), ["public.b()", "public.c()", "public.a()"]);
}

#[test]
fn two_dependents_keep_their_relative_order() {
    let b = make_function(2, "b");
    let a = depends(make_function(1, "a"), &[&b]);
    let c = depends(make_function(3, "c"), &[&b]);

    let sorted = topological_sort(vec![a, b, c]).unwrap();
    assert_eq!(names(&sorted), ["public.b()", "public.a()", "public.c()"]);
}

#[test]
fn mixed_kinds_sort_together() {
    let table = make_table(10, "orders");
    let func = depends(make_function(20, "total"), &[&table]);

    let sorted = topological_sort(vec![func, table]).unwrap();
    assert_eq!(names(&sorted), ["public.orders", "public.total()"]);
}

#[test]
fn same_oid_in_different_catalogs_is_distinct() {
    let table = make_table(7, "t");
    let func = depends(make_function(7, "f"), &[&table]);

    let sorted = topological_sort(vec![func, table]).unwrap();
    assert_eq!(names(&sorted), ["public.t", "public.f()"]);
}

// ---- failures

#[test]
fn cycle_is_reported() {
    let mut a = make_function(1, "a");
    let mut b = make_function(2, "b");
    let mut c = make_function(3, "c");
    a.set_depends_upon(vec![c.unique_id()]);
    c.set_depends_upon(vec![b.unique_id()]);
    b.set_depends_upon(vec![a.unique_id()]);

    let err = topological_sort(vec![a, b, c]).unwrap_err();
    assert!(err.is_dependency_cycle());
    assert!(err.is_fatal());
}

#[test]
fn unknown_dependency_is_reported() {
    let a = depends(make_function(1, "a"), &[&make_function(99, "missing")]);

    let err = topological_sort(vec![a]).unwrap_err();
    assert!(err.is_dangling_dependency());
    assert!(err.to_string().contains("public.a()"));
}
