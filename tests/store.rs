use camino::Utf8PathBuf;
use regex::Regex;

use isbn_harvest::domain::{FetchKind, InsertOutcome, Isbn, MarcField, MarcFlag};
use isbn_harvest::store::CatalogStore;

fn isbn(value: &str) -> Isbn {
    value.parse().unwrap()
}

fn field(isbn_value: &str, tag: &str, code: &str, value: &str) -> MarcField {
    MarcField {
        isbn: isbn(isbn_value),
        tag: tag.to_string(),
        code: code.to_string(),
        value: value.to_string(),
    }
}

fn deposit_pattern() -> Regex {
    Regex::new(r"deposit\.d-?nb\.de").unwrap()
}

fn memory_store() -> CatalogStore {
    let store = CatalogStore::open_in_memory().unwrap();
    store.initialize().unwrap();
    store
}

#[test]
fn catalog_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("nested").join("books.db")).unwrap();

    {
        let mut store = CatalogStore::open(&path).unwrap();
        store.initialize().unwrap();
        let inserted = store
            .import_isbns(vec![isbn("B"), isbn("A"), isbn("A")])
            .unwrap();
        assert_eq!(inserted, 2);
        store.mark_marc_downloaded(&isbn("A"), MarcFlag::Found).unwrap();
    }

    let store = CatalogStore::open(&path).unwrap();
    store.initialize().unwrap();
    let mut all = store.all_isbns().unwrap();
    all.sort();
    assert_eq!(all, vec![isbn("A"), isbn("B")]);
    assert_eq!(
        store.completed_isbns(FetchKind::Marc21).unwrap(),
        vec![isbn("A")]
    );
}

#[test]
fn duplicate_catalog_entry_is_reported() {
    let store = memory_store();
    assert_eq!(store.insert_isbn(&isbn("A")).unwrap(), InsertOutcome::Inserted);
    assert_eq!(
        store.insert_isbn(&isbn("A")).unwrap(),
        InsertOutcome::AlreadyExists
    );
}

#[test]
fn field_rows_are_insert_if_absent() {
    let mut store = memory_store();
    let fields = vec![field("A", "245", "a", "Title"), field("A", "100", "a", "Author")];

    assert_eq!(
        store.insert_marc_fields(&fields).unwrap(),
        InsertOutcome::Inserted
    );
    assert_eq!(
        store.insert_marc_fields(&fields).unwrap(),
        InsertOutcome::AlreadyExists
    );
    assert_eq!(store.marc_fields(&isbn("A")).unwrap().len(), 2);
}

#[test]
fn blurb_links_filter_by_pattern_and_take_first() {
    let mut store = memory_store();
    store
        .insert_marc_fields(&[
            field("A", "856", "u", "http://deposit.dnb.de/cgi-bin/dokserv?id=2"),
            field("A", "856", "u", "http://deposit.dnb.de/cgi-bin/dokserv?id=1"),
            field("B", "856", "u", "https://d-nb.info/1012345678/04"),
            field("C", "245", "a", "http://deposit.dnb.de/not-a-link-field"),
            field("D", "856", "u", "https://deposit.d-nb.de/cgi-bin/dokserv?id=9"),
        ])
        .unwrap();

    let links = store.blurb_links(&deposit_pattern()).unwrap();
    assert_eq!(
        links,
        vec![
            (
                isbn("A"),
                "http://deposit.dnb.de/cgi-bin/dokserv?id=1".to_string()
            ),
            (
                isbn("D"),
                "https://deposit.d-nb.de/cgi-bin/dokserv?id=9".to_string()
            ),
        ]
    );
}

#[test]
fn blurb_presence_is_the_completion_marker() {
    let store = memory_store();
    let a = isbn("A");
    assert!(store.completed_isbns(FetchKind::Blurb).unwrap().is_empty());

    assert_eq!(
        store.insert_blurb(&a, "hello world", "http://deposit.dnb.de/x").unwrap(),
        InsertOutcome::Inserted
    );
    assert_eq!(
        store.insert_blurb(&a, "other", "http://deposit.dnb.de/y").unwrap(),
        InsertOutcome::AlreadyExists
    );

    let record = store.blurb(&a).unwrap().unwrap();
    assert_eq!(record.text, "hello world");
    assert_eq!(store.completed_isbns(FetchKind::Blurb).unwrap(), vec![a]);
}

#[test]
fn status_counts_pending_per_kind() {
    let mut store = memory_store();
    store
        .import_isbns(vec![isbn("A"), isbn("B"), isbn("C")])
        .unwrap();
    store.mark_marc_downloaded(&isbn("A"), MarcFlag::Found).unwrap();
    store.mark_marc_downloaded(&isbn("B"), MarcFlag::Empty).unwrap();
    store
        .insert_marc_fields(&[field("A", "856", "u", "http://deposit.dnb.de/a")])
        .unwrap();

    let status = store.status(&deposit_pattern()).unwrap();
    assert_eq!(status.books, 3);
    assert_eq!(status.marc21_found, 1);
    assert_eq!(status.marc21_empty, 1);
    assert_eq!(status.field_rows, 1);

    let marc = &status.kinds[0];
    assert_eq!(marc.kind, FetchKind::Marc21);
    assert_eq!((marc.candidates, marc.completed, marc.pending), (3, 2, 1));

    let blurb = &status.kinds[1];
    assert_eq!(blurb.kind, FetchKind::Blurb);
    assert_eq!((blurb.candidates, blurb.completed, blurb.pending), (1, 0, 1));
}

#[test]
fn blank_and_padded_rows_read_back_unchanged() {
    let store = memory_store();
    for raw in ["", "A "] {
        store.insert_isbn(&Isbn::from_stored(raw.to_string())).unwrap();
    }
    let mut all = store.all_isbns().unwrap();
    all.sort();
    assert_eq!(
        all,
        vec![
            Isbn::from_stored(String::new()),
            Isbn::from_stored("A ".to_string())
        ]
    );
}
