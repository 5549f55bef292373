use isbn_harvest::domain::Isbn;
use isbn_harvest::resolver::pending;

fn isbns(values: &[&str]) -> Vec<Isbn> {
    values.iter().map(|value| value.parse().unwrap()).collect()
}

#[test]
fn result_is_independent_of_input_order() {
    let expected = isbns(&["3446229973", "3499226863", "9783161484100"]);
    let done = isbns(&["3257229534"]);
    let orderings = [
        ["9783161484100", "3257229534", "3446229973", "3499226863"],
        ["3499226863", "3446229973", "9783161484100", "3257229534"],
        ["3257229534", "3499226863", "3446229973", "9783161484100"],
    ];
    for ordering in orderings {
        assert_eq!(pending(isbns(&ordering), done.clone()), expected);
    }
}

#[test]
fn completed_order_and_duplicates_do_not_matter() {
    let all = isbns(&["C", "B", "A"]);
    let done = isbns(&["B", "B", "C"]);
    assert_eq!(pending(all, done), isbns(&["A"]));
}

#[test]
fn empty_catalog_is_empty() {
    assert!(pending(Vec::new(), isbns(&["A"])).is_empty());
}
