mod common;

use bson::{Bson, Document, doc, oid::ObjectId};
use docmapper::prelude::*;

use common::{Article, Author, CountingBackend, Tag, seed};

async fn authors(registry: &ConnectionRegistry) -> (ObjectId, ObjectId) {
    let authors = seed::<Author>(registry, vec![doc! { "name": "Ann" }, doc! { "name": "Bob" }]).await;

    (authors[0].id().unwrap(), authors[1].id().unwrap())
}

fn author_name<'a>(records: &'a Document, article: &Entity) -> Option<&'a str> {
    records
        .get_document(article.string_id()?)
        .ok()?
        .get_document("author")
        .ok()?
        .get_str("name")
        .ok()
}

fn counting_registry() -> (CountingBackend, ConnectionRegistry) {
    let backend = CountingBackend::new();
    let registry = ConnectionRegistry::new(backend.clone());

    (backend, registry)
}

#[tokio::test]
async fn batch_joins_issue_one_lookup_per_directive() {
    let (backend, registry) = counting_registry();
    let (ann, bob) = authors(&registry).await;

    seed::<Article>(&registry, vec![
        doc! { "title": "one", "author": ann },
        doc! { "title": "two", "author": bob },
        doc! { "title": "three", "author": ann },
        doc! { "title": "four", "author": bob },
    ])
    .await;
    backend.reset();

    let mut mapper = Article::mapper(&registry).unwrap();
    mapper
        .find(doc! {}, None)
        .unwrap()
        .sort(doc! { "title": 1 })
        .unwrap()
        .join::<Author>("author", None);

    let articles = mapper.get_entities().await.unwrap();

    assert_eq!(backend.reads("articles"), 1);
    assert_eq!(backend.reads("authors"), 1);
    assert_eq!(articles.len(), 4);

    for article in articles.values() {
        let author = article.embedded("author").unwrap();
        let expected = match article.get_str("title") {
            Some("one") | Some("three") => "Ann",
            _ => "Bob",
        };

        assert_eq!(author.get_str("name"), Some(expected));
        assert!(author.schema().is(&Author::schema()));
    }
}

#[tokio::test]
async fn joins_write_to_the_destination_field() {
    let (_, registry) = counting_registry();
    let (ann, _) = authors(&registry).await;

    seed::<Article>(&registry, vec![
        doc! { "title": "one", "author": ann },
        doc! { "title": "two", "author": Bson::Null },
    ])
    .await;

    let mut mapper = Article::mapper(&registry).unwrap();
    mapper
        .find(doc! {}, None)
        .unwrap()
        .sort(doc! { "title": 1 })
        .unwrap()
        .join::<Author>("author", Some("author_object"));

    let articles = mapper.get_entities().await.unwrap();
    let mut articles = articles.values();

    let one = articles.next().unwrap();
    assert_eq!(one.get_bson("author"), Some(&Bson::ObjectId(ann)));
    assert_eq!(one.embedded("author_object").unwrap().get_str("name"), Some("Ann"));

    let two = articles.next().unwrap();
    assert!(two.get("author").unwrap().is_null());
    assert!(!two.contains("author_object"));
}

#[tokio::test]
async fn missing_targets_resolve_to_null() {
    let (_, registry) = counting_registry();
    authors(&registry).await;

    seed::<Article>(&registry, vec![doc! { "title": "orphan", "author": ObjectId::new() }]).await;

    let mut mapper = Article::mapper(&registry).unwrap();
    mapper.find(doc! {}, None).unwrap().join::<Author>("author", None);

    let articles = mapper.get_entities().await.unwrap();
    let orphan = articles.first().unwrap();

    assert!(orphan.contains("author"));
    assert!(orphan.get("author").unwrap().is_null());
}

#[tokio::test]
async fn records_are_joined_in_array_mode() {
    let (backend, registry) = counting_registry();
    let (ann, bob) = authors(&registry).await;

    let articles = seed::<Article>(&registry, vec![
        doc! { "title": "one", "author": ann },
        doc! { "title": "two", "author": bob },
        doc! { "title": "three", "author": ObjectId::new() },
    ])
    .await;
    backend.reset();

    let mut mapper = Mapper::new(&registry, Article::schema(), FetchMode::Array).unwrap();
    mapper.find(doc! {}, None).unwrap().join::<Author>("author", None);

    let records = mapper.get_array().await.unwrap();

    assert_eq!(backend.reads("authors"), 1);

    assert_eq!(author_name(&records, &articles[0]), Some("Ann"));
    assert_eq!(author_name(&records, &articles[1]), Some("Bob"));

    let orphan = records
        .get_document(articles[2].string_id().unwrap())
        .unwrap();
    assert_eq!(orphan.get("author"), Some(&Bson::Null));

    let json = mapper.get_json().await.unwrap();
    assert!(json.contains("\"Ann\""));
}

#[tokio::test]
async fn materializing_a_joined_cursor_twice_gives_the_same_result() {
    let (_, registry) = counting_registry();
    let (ann, _) = authors(&registry).await;

    seed::<Article>(&registry, vec![doc! { "title": "one", "author": ann }]).await;

    let mut mapper = Mapper::new(&registry, Article::schema(), FetchMode::Array).unwrap();
    mapper.find(doc! {}, None).unwrap().join::<Author>("author", None);

    let first = mapper.get_array().await.unwrap();
    let second = mapper.get_array().await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn repeated_directives_resolve_to_a_single_value() {
    let (backend, registry) = counting_registry();
    let (ann, _) = authors(&registry).await;

    seed::<Article>(&registry, vec![doc! { "title": "one", "author": ann }]).await;
    backend.reset();

    let mut mapper = Article::mapper(&registry).unwrap();
    mapper
        .find(doc! {}, None)
        .unwrap()
        .join::<Author>("author", Some("author_object"))
        .join::<Author>("author", Some("author_object"));

    let articles = mapper.get_entities().await.unwrap();
    let article = articles.first().unwrap();

    assert_eq!(backend.reads("authors"), 2);
    assert_eq!(article.get_bson("author"), Some(&Bson::ObjectId(ann)));
    assert_eq!(article.fields().filter(|(name, _)| *name == "author_object").count(), 1);

    let joined = article.embedded("author_object").unwrap();
    assert_eq!(joined.id(), Some(ann));
    assert_eq!(joined.get_str("name"), Some("Ann"));

    backend.reset();
    mapper.set_fetch_mode(FetchMode::Array);

    let records = mapper.get_array().await.unwrap();
    let record = records.get_document(article.string_id().unwrap()).unwrap();

    assert_eq!(backend.reads("authors"), 2);
    assert_eq!(record.get("author"), Some(&Bson::ObjectId(ann)));
    assert_eq!(record.keys().filter(|key| *key == "author_object").count(), 1);
    assert_eq!(record.get_document("author_object").unwrap().get_str("name").unwrap(), "Ann");
}

#[tokio::test]
async fn repeated_in_place_directives_skip_resolved_fields() {
    let (backend, registry) = counting_registry();
    let (ann, _) = authors(&registry).await;

    let articles = seed::<Article>(&registry, vec![doc! { "title": "one", "author": ann }]).await;
    backend.reset();

    let mut mapper = Article::mapper(&registry).unwrap();
    mapper
        .find(doc! {}, None)
        .unwrap()
        .join::<Author>("author", None)
        .join::<Author>("author", None);

    let entities = mapper.get_entities().await.unwrap();
    let author = entities.first().unwrap().embedded("author").unwrap();

    assert_eq!(backend.reads("authors"), 1);
    assert_eq!(author.id(), Some(ann));
    assert_eq!(author.get_str("name"), Some("Ann"));

    backend.reset();
    mapper.set_fetch_mode(FetchMode::Array);

    let records = mapper.get_array().await.unwrap();

    assert_eq!(backend.reads("authors"), 1);
    assert_eq!(author_name(&records, &articles[0]), Some("Ann"));
}

#[tokio::test]
async fn join_one_resolves_a_single_reference() {
    let (backend, registry) = counting_registry();
    let (ann, _) = authors(&registry).await;

    let mut article = Entity::of::<Article>();
    article.set("author", ann);
    backend.reset();

    article
        .join_one::<Author>(&registry, "author", Some("writer"), Some(doc! { "name": 1 }))
        .await
        .unwrap();

    assert_eq!(backend.reads("authors"), 1);
    assert_eq!(article.get_bson("author"), Some(&Bson::ObjectId(ann)));

    let writer = article.embedded("writer").unwrap();
    assert_eq!(writer.id(), Some(ann));
    assert_eq!(writer.get_str("name"), Some("Ann"));

    article
        .join_one::<Author>(&registry, "author", None, None)
        .await
        .unwrap();
    assert_eq!(article.embedded("author").unwrap().get_str("name"), Some("Ann"));

    // The source now holds an entity, not a reference.
    backend.reset();
    article
        .join_one::<Author>(&registry, "author", None, None)
        .await
        .unwrap();
    assert_eq!(backend.reads("authors"), 0);
}

#[tokio::test]
async fn join_one_leaves_entities_without_a_reference_alone() {
    let (backend, registry) = counting_registry();

    let mut article = Entity::of::<Article>();
    article.set("author", "not-an-identifier");

    article
        .join_one::<Author>(&registry, "author", None, None)
        .await
        .unwrap()
        .join_one::<Author>(&registry, "editor", None, None)
        .await
        .unwrap();

    assert_eq!(backend.reads("authors"), 0);
    assert_eq!(article.get_str("author"), Some("not-an-identifier"));
    assert!(!article.contains("editor"));

    article.set("author", ObjectId::new());
    article
        .join_one::<Author>(&registry, "author", None, None)
        .await
        .unwrap();
    assert!(article.get("author").unwrap().is_null());
}

#[tokio::test]
async fn join_many_resolves_a_list_of_references() {
    let (backend, registry) = counting_registry();
    let tags = seed::<Tag>(&registry, vec![doc! { "name": "rust" }, doc! { "name": "mongo" }]).await;
    let (rust, mongo) = (tags[0].id().unwrap(), tags[1].id().unwrap());

    let mut article = Entity::of::<Article>();
    article.set("tags", vec![Bson::ObjectId(rust), Bson::String("junk".into()), Bson::ObjectId(mongo), Bson::ObjectId(rust)]);
    backend.reset();

    article
        .join_many::<Tag>(&registry, "tags", Some("tag_objects"), None)
        .await
        .unwrap();

    assert_eq!(backend.reads("tags"), 1);

    let related = article.related("tag_objects").unwrap();
    assert_eq!(related.len(), 2);
    assert_eq!(related.get(&rust.to_hex()).unwrap().get_str("name"), Some("rust"));
    assert_eq!(related.get(&mongo.to_hex()).unwrap().get_str("name"), Some("mongo"));
    assert!(matches!(article.get_bson("tags"), Some(Bson::Array(items)) if items.len() == 4));
}

#[tokio::test]
async fn join_many_ignores_empty_and_missing_lists() {
    let (backend, registry) = counting_registry();

    let mut article = Entity::of::<Article>();
    article.set("tags", Bson::Array(Vec::new()));
    article.set("labels", "rust");

    article
        .join_many::<Tag>(&registry, "tags", None, None)
        .await
        .unwrap()
        .join_many::<Tag>(&registry, "labels", None, None)
        .await
        .unwrap()
        .join_many::<Tag>(&registry, "missing", None, None)
        .await
        .unwrap();

    assert_eq!(backend.reads("tags"), 0);
    assert_eq!(article.get_bson("tags"), Some(&Bson::Array(Vec::new())));
    assert_eq!(article.get_str("labels"), Some("rust"));
    assert!(!article.contains("missing"));
}

#[tokio::test]
async fn malformed_references_are_skipped_in_batches() {
    let (backend, registry) = counting_registry();

    seed::<Article>(&registry, vec![
        doc! { "title": "one", "author": "not-an-identifier" },
        doc! { "title": "two" },
    ])
    .await;
    backend.reset();

    let mut mapper = Article::mapper(&registry).unwrap();
    mapper.find(doc! {}, None).unwrap().join::<Author>("author", None);

    let articles = mapper.get_entities().await.unwrap();

    assert_eq!(backend.reads("authors"), 0);
    assert_eq!(articles.first().unwrap().get_str("author"), Some("not-an-identifier"));
    assert!(!articles.last().unwrap().contains("author"));
}
