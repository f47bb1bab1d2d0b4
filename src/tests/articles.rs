use crate::test_utils::test_utils::{
    assert_redirects, assert_template_used, create_test_article, create_test_comment,
    create_test_user, setup_test_app, TEST_PASSWORD,
};
use axum::http::StatusCode;
use model::entities::{article, comment};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

#[tokio::test]
async fn test_anonymous_users_are_sent_to_login() {
    let app = setup_test_app().await;
    let author = create_test_user(app.db(), "author").await;
    let article = create_test_article(app.db(), &author, "Headline").await;
    let id = article.id;

    for path in [
        "/articles/".to_string(),
        format!("/articles/details/{id}"),
        "/articles/new/".to_string(),
        format!("/articles/edit/{id}"),
        format!("/articles/delete/{id}"),
    ] {
        let response = app.server.get(&path).await;
        assert_redirects(&response, &format!("/accounts/login/?next={path}"));
    }

    let response = app
        .server
        .post("/articles/new/")
        .form(&[("title", "Sneaky"), ("body", "Anonymous")])
        .await;
    assert_redirects(&response, "/accounts/login/?next=/articles/new/");

    let response = app.server.post(&format!("/articles/delete/{id}")).await;
    response.assert_status(StatusCode::FOUND);

    assert_eq!(article::Entity::find().count(app.db()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_article_list_shows_articles_with_comments() {
    let app = setup_test_app().await;
    let author = create_test_user(app.db(), "author").await;
    let reader = create_test_user(app.db(), "reader").await;
    let first = create_test_article(app.db(), &author, "First story").await;
    create_test_article(app.db(), &reader, "Second story").await;
    create_test_comment(app.db(), &first, &reader, "Nice scoop").await;
    let session = app.login("author", TEST_PASSWORD).await;

    let response = app.server.get("/articles/").add_cookie(session).await;

    response.assert_status(StatusCode::OK);
    assert_template_used(&response, "articles/article_list.html");
    let page = response.text();
    assert!(page.contains("First story"));
    assert!(page.contains("Second story"));
    assert!(page.contains("Nice scoop"));
    assert!(page.find("First story") < page.find("Second story"));
    // edit links only on the viewer's own articles
    assert!(page.contains(&format!("/articles/edit/{}", first.id)));
    assert_eq!(page.matches("/articles/edit/").count(), 1);
}

#[tokio::test]
async fn test_article_list_pagination() {
    let app = setup_test_app().await;
    let author = create_test_user(app.db(), "author").await;
    for title in ["Alpha", "Bravo", "Charlie"] {
        create_test_article(app.db(), &author, title).await;
    }
    let session = app.login("author", TEST_PASSWORD).await;

    let response = app
        .server
        .get("/articles/?page=2&limit=1")
        .add_cookie(session.clone())
        .await;
    response.assert_status(StatusCode::OK);
    let page = response.text();
    assert!(page.contains("Bravo"));
    assert!(!page.contains("Alpha"));
    assert!(!page.contains("Charlie"));
    assert!(page.contains("Page 2 of 3"));

    for query in ["page=0", "page=10001", "limit=0", "limit=1001", "page=abc"] {
        let response = app
            .server
            .get(&format!("/articles/?{query}"))
            .add_cookie(session.clone())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_article_detail() {
    let app = setup_test_app().await;
    let author = create_test_user(app.db(), "author").await;
    let article = create_test_article(app.db(), &author, "Deep dive").await;
    create_test_comment(app.db(), &article, &author, "Author's note").await;
    let session = app.login("author", TEST_PASSWORD).await;

    let response = app
        .server
        .get(&format!("/articles/details/{}", article.id))
        .add_cookie(session.clone())
        .await;

    response.assert_status(StatusCode::OK);
    assert_template_used(&response, "articles/article_detail.html");
    let page = response.text();
    assert!(page.contains("Deep dive"));
    assert!(page.contains("Body of Deep dive"));
    assert!(page.contains(r#"name="comment""#));
    assert!(page.contains("Author&#x27;s note"));

    app.server
        .get("/articles/details/9999")
        .add_cookie(session)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_article_sets_author_from_session() {
    let app = setup_test_app().await;
    let author = create_test_user(app.db(), "author").await;
    let session = app.login("author", TEST_PASSWORD).await;

    let response = app.server.get("/articles/new/").add_cookie(session.clone()).await;
    response.assert_status(StatusCode::OK);
    assert_template_used(&response, "articles/article_new.html");

    let response = app
        .server
        .post("/articles/new/")
        .add_cookie(session)
        .form(&[("title", "Fresh news"), ("body", "Hot off the press")])
        .await;

    let created = article::Entity::find()
        .filter(article::Column::Title.eq("Fresh news"))
        .one(app.db())
        .await
        .unwrap()
        .expect("article stored");
    assert_redirects(&response, &format!("/articles/details/{}", created.id));
    assert_eq!(created.author_id, author.id);
    assert_eq!(created.body, "Hot off the press");
}

#[tokio::test]
async fn test_create_article_with_invalid_form() {
    let app = setup_test_app().await;
    create_test_user(app.db(), "author").await;
    let session = app.login("author", TEST_PASSWORD).await;
    let long_title = "x".repeat(256);

    for form in [[("title", ""), ("body", "Body")], [("title", long_title.as_str()), ("body", "Body")]] {
        let response = app
            .server
            .post("/articles/new/")
            .add_cookie(session.clone())
            .form(&form)
            .await;
        response.assert_status(StatusCode::OK);
        assert_template_used(&response, "articles/article_new.html");
    }
    assert_eq!(article::Entity::find().count(app.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_author_can_edit_article() {
    let app = setup_test_app().await;
    let author = create_test_user(app.db(), "author").await;
    let article = create_test_article(app.db(), &author, "Draft title").await;
    let session = app.login("author", TEST_PASSWORD).await;
    let path = format!("/articles/edit/{}", article.id);

    let response = app.server.get(&path).add_cookie(session.clone()).await;
    response.assert_status(StatusCode::OK);
    assert_template_used(&response, "articles/article_edit.html");
    assert!(response.text().contains(r#"value="Draft title""#));

    let response = app
        .server
        .post(&path)
        .add_cookie(session)
        .form(&[("title", "Final title"), ("body", "Final body")])
        .await;
    assert_redirects(&response, &format!("/articles/details/{}", article.id));

    let updated = article::Entity::find_by_id(article.id).one(app.db()).await.unwrap().unwrap();
    assert_eq!(updated.title, "Final title");
    assert_eq!(updated.body, "Final body");
    assert_eq!(updated.author_id, author.id);
    assert_eq!(updated.date, article.date);
}

#[tokio::test]
async fn test_non_author_cannot_edit_or_delete() {
    let app = setup_test_app().await;
    let author = create_test_user(app.db(), "author").await;
    create_test_user(app.db(), "intruder").await;
    let article = create_test_article(app.db(), &author, "Protected").await;
    let session = app.login("intruder", TEST_PASSWORD).await;

    for path in [
        format!("/articles/edit/{}", article.id),
        format!("/articles/delete/{}", article.id),
    ] {
        app.server
            .get(&path)
            .add_cookie(session.clone())
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    app.server
        .post(&format!("/articles/edit/{}", article.id))
        .add_cookie(session.clone())
        .form(&[("title", "Defaced"), ("body", "Defaced")])
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post(&format!("/articles/delete/{}", article.id))
        .add_cookie(session)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let unchanged = article::Entity::find_by_id(article.id).one(app.db()).await.unwrap().unwrap();
    assert_eq!(unchanged, article);
}

#[tokio::test]
async fn test_edit_and_delete_unknown_article_is_404() {
    let app = setup_test_app().await;
    create_test_user(app.db(), "author").await;
    let session = app.login("author", TEST_PASSWORD).await;

    for path in ["/articles/edit/9999", "/articles/delete/9999"] {
        app.server
            .get(path)
            .add_cookie(session.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_non_numeric_article_id_is_404() {
    let app = setup_test_app().await;
    create_test_user(app.db(), "author").await;
    let session = app.login("author", TEST_PASSWORD).await;

    for path in [
        "/articles/details/abc",
        "/articles/edit/abc",
        "/articles/delete/1.5",
        "/articles/details/99999999999",
    ] {
        app.server
            .get(path)
            .add_cookie(session.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
    app.server
        .post("/articles/delete/abc")
        .add_cookie(session)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_article_fields_are_stored_stripped() {
    let app = setup_test_app().await;
    create_test_user(app.db(), "author").await;
    let session = app.login("author", TEST_PASSWORD).await;

    let response = app
        .server
        .post("/articles/new/")
        .add_cookie(session.clone())
        .form(&[("title", "  Padded headline  "), ("body", "\n  Padded body \n")])
        .await;
    response.assert_status(StatusCode::FOUND);

    let created = article::Entity::find().one(app.db()).await.unwrap().expect("article stored");
    assert_eq!(created.title, "Padded headline");
    assert_eq!(created.body, "Padded body");

    let response = app
        .server
        .post(&format!("/articles/edit/{}", created.id))
        .add_cookie(session)
        .form(&[("title", " Tidy "), ("body", " Tidy body ")])
        .await;
    response.assert_status(StatusCode::FOUND);

    let updated = article::Entity::find_by_id(created.id).one(app.db()).await.unwrap().unwrap();
    assert_eq!(updated.title, "Tidy");
    assert_eq!(updated.body, "Tidy body");
}

#[tokio::test]
async fn test_author_can_delete_article_and_its_comments() {
    let app = setup_test_app().await;
    let author = create_test_user(app.db(), "author").await;
    let reader = create_test_user(app.db(), "reader").await;
    let doomed = create_test_article(app.db(), &author, "Doomed").await;
    let survivor = create_test_article(app.db(), &author, "Survivor").await;
    create_test_comment(app.db(), &doomed, &reader, "Bye").await;
    create_test_comment(app.db(), &survivor, &reader, "Stay").await;
    let session = app.login("author", TEST_PASSWORD).await;
    let path = format!("/articles/delete/{}", doomed.id);

    let response = app.server.get(&path).add_cookie(session.clone()).await;
    response.assert_status(StatusCode::OK);
    assert_template_used(&response, "articles/article_delete.html");
    assert!(response.text().contains("Doomed"));

    let response = app.server.post(&path).add_cookie(session).await;
    assert_redirects(&response, "/articles/");

    assert!(article::Entity::find_by_id(doomed.id).one(app.db()).await.unwrap().is_none());
    let comments = comment::Entity::find().all(app.db()).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].article_id, survivor.id);
}
