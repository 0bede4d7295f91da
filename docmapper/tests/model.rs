mod common;

use bson::{Bson, doc, oid::ObjectId};
use docmapper::{entity::{CREATED_AT_FIELD, UPDATED_AT_FIELD}, prelude::*};

use common::{Article, Book, Comment, Note, Simple, Stamped, Unnamed, registry};

#[tokio::test]
async fn second_save_keeps_the_identifier() {
    let registry = registry();
    let mut entity = Entity::of::<Simple>();
    entity.set("letter", "a");

    assert!(!entity.has_id());
    let first = entity.save(&registry).await.unwrap();
    let id = entity.id().unwrap();

    assert_eq!(first.upserted_id, Some(Bson::ObjectId(id)));
    assert_eq!(entity.string_id(), Some(id.to_hex().as_str()));

    entity.set("letter", "b");
    entity.save(&registry).await.unwrap();

    assert_eq!(entity.id(), Some(id));
    assert_eq!(Simple::mapper(&registry).unwrap().count(doc! {}).await.unwrap(), 1);

    let stored = Simple::find_by_id(&registry, id).await.unwrap().unwrap();
    assert_eq!(stored.get_str("letter"), Some("b"));
}

#[tokio::test]
async fn string_identifiers_never_reach_storage() {
    let registry = registry();
    let mut article = Entity::from_document(Article::schema(), doc! {
        "title": "Hello",
        "note": { "_id": ObjectId::new(), "text": "draft" },
        "comments": [
            { "_id": ObjectId::new(), "text": "first" },
            { "_id": ObjectId::new(), "text": "second" },
        ],
    })
    .unwrap();

    assert!(article.embedded("note").unwrap().string_id().is_some());

    article.save(&registry).await.unwrap();
    article.save(&registry).await.unwrap();

    assert!(article.string_id().is_some());
    assert!(article.embedded("note").unwrap().string_id().is_none());
    assert!(article.list("comments").unwrap().iter().all(|comment| comment.string_id().is_none()));

    let stored = registry
        .collection_for(&Article::schema())
        .unwrap()
        .find_one(doc! {}, None)
        .await
        .unwrap()
        .unwrap();

    assert!(!stored.contains_key("id"));
    assert!(!stored.get_document("note").unwrap().contains_key("id"));

    for comment in stored.get_array("comments").unwrap() {
        assert!(!comment.as_document().unwrap().contains_key("id"));
    }
}

#[tokio::test]
async fn hydration_preserves_stored_values() {
    let registry = registry();
    let id = ObjectId::new();

    registry
        .collection_for(&Article::schema())
        .unwrap()
        .insert(vec![doc! {
            "_id": id,
            "title": "Hello",
            "views": 42,
            "tags": ["a", "b"],
            "note": { "text": "draft" },
            "comments": [{ "text": "first" }, 7, { "text": "second" }],
        }])
        .await
        .unwrap();

    let article = Article::find_one(&registry, doc! { "title": "Hello" }, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(article.id(), Some(id));
    assert_eq!(article.string_id(), Some(id.to_hex().as_str()));
    assert_eq!(article.get_bson("views"), Some(&Bson::Int32(42)));
    assert_eq!(article.get_bson("tags"), Some(&Bson::Array(vec!["a".into(), "b".into()])));

    let note = article.embedded("note").unwrap();
    assert!(note.schema().is(&Note::schema()));
    assert_eq!(note.get_str("text"), Some("draft"));

    let comments = article.list("comments").unwrap();
    assert_eq!(comments.len(), 2);
    assert!(comments.iter().all(|comment| comment.schema().is(&Comment::schema())));
    assert_eq!(comments[1].get_str("text"), Some("second"));
}

#[tokio::test]
async fn embedded_lists_survive_a_load_and_save() {
    let registry = registry();
    let collection = registry.collection_for(&Article::schema()).unwrap();

    collection
        .insert(vec![doc! {
            "title": "Hello",
            "comments": [{ "text": "first" }, 7, { "text": "second" }],
        }])
        .await
        .unwrap();

    let mut article = Article::find_one(&registry, doc! {}, None)
        .await
        .unwrap()
        .unwrap();
    article.set("title", "Updated");
    article.save(&registry).await.unwrap();

    let stored = collection.find_one(doc! {}, None).await.unwrap().unwrap();
    let comments = stored.get_array("comments").unwrap();

    assert_eq!(stored.get_str("title").unwrap(), "Updated");
    assert_eq!(comments.len(), 3);
    assert_eq!(comments[0].as_document().unwrap().get_str("text").unwrap(), "first");
    assert_eq!(comments[1], Bson::Int32(7));
    assert_eq!(comments[2].as_document().unwrap().get_str("text").unwrap(), "second");
}

#[tokio::test]
async fn timestamps_are_maintained_on_save() {
    let registry = registry();

    let mut stamped = Entity::of::<Stamped>();
    stamped.save(&registry).await.unwrap();

    let created = stamped.get_bson(CREATED_AT_FIELD).cloned().unwrap();
    assert!(matches!(created, Bson::DateTime(_)));
    assert!(stamped.date(UPDATED_AT_FIELD, None).is_some());

    stamped.save(&registry).await.unwrap();
    assert_eq!(stamped.get_bson(CREATED_AT_FIELD), Some(&created));

    let mut plain = Entity::of::<Simple>();
    plain.save(&registry).await.unwrap();
    assert!(!plain.contains(CREATED_AT_FIELD));
    assert!(!plain.contains(UPDATED_AT_FIELD));
}

#[tokio::test]
async fn remove_deletes_by_identifier() {
    let registry = registry();

    let mut kept = Entity::of::<Simple>();
    kept.save(&registry).await.unwrap();

    let mut removed = Entity::of::<Simple>();
    removed.save(&registry).await.unwrap();

    assert_eq!(removed.remove(&registry).await.unwrap().deleted, 1);
    assert!(Simple::find_by_id(&registry, removed.id().unwrap()).await.unwrap().is_none());
    assert!(Simple::find_by_id(&registry, kept.id().unwrap()).await.unwrap().is_some());

    let unsaved = Entity::of::<Simple>();
    assert_eq!(unsaved.remove(&registry).await.unwrap().deleted, 0);
}

#[tokio::test]
async fn models_without_a_collection_cannot_be_mapped() {
    let registry = registry();

    let err = Unnamed::mapper(&registry).unwrap_err();
    assert!(matches!(err, MapperError::MissingCollectionName(_)));
    assert!(err.is_configuration());

    let err = Entity::of::<Unnamed>().save(&registry).await.unwrap_err();
    assert!(matches!(err, MapperError::MissingCollectionName(_)));
}

#[tokio::test]
async fn model_shortcuts_query_their_own_collection() {
    let registry = registry();

    let mut entity = Entity::of::<Simple>();
    entity.set("letter", "a");
    entity.save(&registry).await.unwrap();

    let found = Simple::find_one(&registry, doc! { "letter": "a" }, Some(doc! { "letter": 1 }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), entity.id());

    let by_string = Simple::find_by_id(&registry, entity.string_id().unwrap()).await.unwrap();
    assert!(by_string.is_some());

    let all = Simple::find(&registry, doc! {}, None)
        .unwrap()
        .get()
        .await
        .unwrap()
        .into_entities()
        .unwrap();
    assert_eq!(all.len(), 1);

    assert!(Article::find_one(&registry, doc! {}, None).await.unwrap().is_none());
}

#[tokio::test]
async fn serde_models_round_trip_through_entities() {
    let registry = registry();
    let book = Book {
        id: None,
        title: "Dune".to_string(),
        pages: 412,
    };

    let mut entity = Entity::from_model(&book).unwrap();
    assert!(entity.schema().is(&Book::schema()));
    entity.save(&registry).await.unwrap();

    let stored = Book::find_by_id(&registry, entity.id().unwrap())
        .await
        .unwrap()
        .unwrap();
    let restored: Book = stored.to_model().unwrap();

    assert_eq!(restored.title, "Dune");
    assert_eq!(restored.pages, 412);
    assert_eq!(restored.id.as_deref(), entity.string_id());
}
