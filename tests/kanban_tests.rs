mod common;

use axum::http::StatusCode;
use common::test_app;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_board_lifecycle_end_to_end() {
    let app = test_app().await;

    let (status, board) = app.post("/api/boards", json!({ "name": "Sprint 1" })).await;
    assert_eq!(status, StatusCode::OK);
    let id = board["_id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(board["createdAt"], board["updatedAt"]);

    let (status, boards) = app.get("/api/boards").await;
    assert_eq!(status, StatusCode::OK);
    assert!(boards.as_array().unwrap().iter().any(|b| b["_id"] == id.as_str()));

    let (status, body) = app.delete(&format!("/api/boards/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "deleted");
    assert!(body.get("cascade").is_none());

    let (status, statuses) = app.get(&format!("/api/statuses?boardId={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(statuses, json!([]));
}

#[tokio::test]
async fn test_board_delete_cascades_to_statuses_and_cards() {
    let app = test_app().await;
    let doomed = app.create_board("Doomed").await;
    let kept = app.create_board("Kept").await;

    for board in [&doomed, &kept] {
        let (status, column) = app
            .post("/api/statuses", json!({ "boardId": board, "name": "Todo" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .post(
                "/api/cards",
                json!({ "boardId": board, "statusId": column["_id"], "title": "Task" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = app.delete(&format!("/api/boards/{doomed}")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, statuses) = app.get(&format!("/api/statuses?boardId={doomed}")).await;
    assert_eq!(statuses, json!([]));
    let (_, cards) = app.get(&format!("/api/cards?boardId={doomed}")).await;
    assert_eq!(cards, json!([]));

    let (_, statuses) = app.get(&format!("/api/statuses?boardId={kept}")).await;
    assert_eq!(statuses.as_array().unwrap().len(), 1);
    let (_, cards) = app.get(&format!("/api/cards?boardId={kept}")).await;
    assert_eq!(cards.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_status_delete_clears_card_references() {
    let app = test_app().await;
    let board = app.create_board("Board").await;
    let (_, column) = app
        .post("/api/statuses", json!({ "boardId": board, "name": "Doing" }))
        .await;
    let column_id = column["_id"].as_str().unwrap().to_string();

    let (_, card) = app
        .post(
            "/api/cards",
            json!({ "boardId": board, "statusId": column_id, "title": "Survivor" }),
        )
        .await;
    assert_eq!(card["statusId"], column_id.as_str());

    let (status, _) = app.delete(&format!("/api/statuses/{column_id}")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, cards) = app.get(&format!("/api/cards?boardId={board}")).await;
    let cards = cards.as_array().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["_id"], card["_id"]);
    assert!(cards[0]["statusId"].is_null());
}

#[tokio::test]
async fn test_card_update_replaces_fields_and_keeps_identity() {
    let app = test_app().await;
    let board = app.create_board("Board").await;

    let (_, card) = app
        .post(
            "/api/cards",
            json!({
                "boardId": board,
                "title": "Draft",
                "description": "first",
                "tags": ["#alpha", "beta", "alpha"],
                "dueDate": "2030-01-01T00:00:00Z"
            }),
        )
        .await;
    let id = card["_id"].as_str().unwrap().to_string();
    assert_eq!(card["tags"], json!(["alpha", "beta"]));

    let (status, updated) = app
        .put(
            &format!("/api/cards/{id}"),
            json!({ "boardId": board, "title": "Final", "color": "red", "dueDate": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["_id"], id.as_str());
    assert_eq!(updated["createdAt"], card["createdAt"]);
    assert_eq!(updated["title"], "Final");
    assert_eq!(updated["description"], "");
    assert_eq!(updated["color"], "red");
    assert_eq!(updated["tags"], json!([]));
    assert!(updated["dueDate"].is_null());
}

#[tokio::test]
async fn test_card_filters_by_tag() {
    let app = test_app().await;
    let board = app.create_board("Board").await;
    for (title, tags) in [("One", json!(["urgent"])), ("Two", json!(["later"]))] {
        app.post(
            "/api/cards",
            json!({ "boardId": board, "title": title, "tags": tags }),
        )
        .await;
    }

    let (status, cards) = app.get("/api/cards?tag=urgent").await;
    assert_eq!(status, StatusCode::OK);
    let cards = cards.as_array().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["title"], "One");

    // A leading '#' in the filter is ignored.
    let (_, cards) = app.get("/api/cards?tag=%23later").await;
    assert_eq!(cards.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_referential_checks_on_create() {
    let app = test_app().await;
    let board = app.create_board("Board").await;

    let (status, _) = app.post("/api/boards", json!({ "name": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/statuses",
            json!({ "boardId": Uuid::new_v4(), "name": "Orphan" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/cards",
            json!({ "boardId": board, "statusId": Uuid::new_v4(), "title": "Lost" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/cards",
            json!({ "boardId": board, "title": "Pic", "image": "/uploads/missing.png" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/cards", json!({ "boardId": board, "title": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Empty statusId means "no status".
    let (status, card) = app
        .post(
            "/api/cards",
            json!({ "boardId": board, "statusId": "", "title": "Loose" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(card["statusId"].is_null());
}

#[tokio::test]
async fn test_missing_and_malformed_ids() {
    let app = test_app().await;

    let (status, body) = app.delete(&format!("/api/boards/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = app.delete("/api/cards/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let board = app.create_board("Board").await;
    let (status, _) = app
        .put(
            &format!("/api/cards/{}", Uuid::new_v4()),
            json!({ "boardId": board, "title": "Ghost" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/statuses?boardId=nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = test_app().await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/boards")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = app.dispatch(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
