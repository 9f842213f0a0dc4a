#[macro_use]
mod common;

use actix_web::{http::StatusCode, test};
use common::{TestState, admin_token, get, post, put, staff_token};
use serde_json::{Value, json};

#[actix_web::test]
async fn staff_create_defaults_to_their_center() {
    let state = TestState::new();
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        post(
            "/api/students",
            &staff_token("north"),
            json!({"firstName": " Amina ", "lastName": "Yusuf", "email": "amina@example.org"}),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["firstName"], "Amina");
    assert_eq!(body["data"]["centerId"], "north");
    assert_eq!(body["data"]["status"], "active");

    let id = body["data"]["id"].as_str().unwrap();
    let stored = state.directory.get(id).await.unwrap().unwrap();
    assert_eq!(stored.center_id, "north");
}

#[actix_web::test]
async fn create_enforces_center_rules() {
    let state = TestState::new();
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        post(
            "/api/students",
            &staff_token("north"),
            json!({"firstName": "A", "lastName": "B", "centerId": "south"}),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(
        &app,
        post(
            "/api/students",
            &admin_token(),
            json!({"firstName": "A", "lastName": "B"}),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        post(
            "/api/students",
            &admin_token(),
            json!({"firstName": "  ", "lastName": "B", "centerId": "south"}),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // too long to fit a by-date partition key
    let resp = test::call_service(
        &app,
        post(
            "/api/students",
            &admin_token(),
            json!({"firstName": "A", "lastName": "B", "centerId": "c".repeat(250)}),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        post(
            "/api/students",
            &admin_token(),
            json!({"firstName": "A", "lastName": "B", "centerId": "south"}),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[actix_web::test]
async fn list_is_scoped_filtered_and_paginated() {
    let state = TestState::new();
    state.add_student("s1", "Amina", "Yusuf", "north").await;
    state.add_student("s2", "Bruno", "Costa", "north").await;
    state.add_student("s3", "Chen", "Wei", "south").await;
    state.add_student("s4", "Dana", "Abara", "north").await;
    let app = test_app!(state);

    let north: Value = test::call_and_read_body_json(
        &app,
        get("/api/students", &staff_token("north")).to_request(),
    )
    .await;
    let names: Vec<&str> = north["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["lastName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Abara", "Costa", "Yusuf"]);
    assert_eq!(north["total"], 3);

    let page: Value = test::call_and_read_body_json(
        &app,
        get("/api/students?page=2&perPage=2", &admin_token()).to_request(),
    )
    .await;
    assert_eq!(page["total"], 4);
    assert_eq!(page["perPage"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);

    let search: Value = test::call_and_read_body_json(
        &app,
        get("/api/students?search=chen", &admin_token()).to_request(),
    )
    .await;
    assert_eq!(search["data"][0]["id"], "s3");

    let resp = test::call_service(
        &app,
        get("/api/students?centerId=south", &staff_token("north")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn get_returns_not_found_and_forbidden() {
    let state = TestState::new();
    state.add_student("s3", "Chen", "Wei", "south").await;
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        get("/api/students/missing", &admin_token()).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(
        &app,
        get("/api/students/s3", &staff_token("north")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let body: Value = test::call_and_read_body_json(
        &app,
        get("/api/students/s3", &staff_token("south")).to_request(),
    )
    .await;
    assert_eq!(body["data"]["firstName"], "Chen");
}

#[actix_web::test]
async fn moving_centers_is_admin_only_and_redirects_new_marks() {
    let state = TestState::new();
    state.add_student("s1", "Amina", "Yusuf", "north").await;
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        put("/api/students/s1", &staff_token("north"), json!({"centerId": "south"})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // marked under north before the move
    let body = json!({"date": "2024-03-10", "records": [{"studentId": "s1", "status": "present"}]});
    test::call_service(&app, post("/api/attendance", &admin_token(), body).to_request()).await;

    let moved: Value = test::call_and_read_body_json(
        &app,
        put(
            "/api/students/s1",
            &admin_token(),
            json!({"centerId": "south", "lastName": "Yusuf-Ali"}),
        )
        .to_request(),
    )
    .await;
    assert_eq!(moved["data"]["centerId"], "south");
    assert_eq!(moved["data"]["lastName"], "Yusuf-Ali");

    let body = json!({"date": "2024-03-11", "records": [{"studentId": "s1", "status": "absent"}]});
    let resp: Value = test::call_and_read_body_json(
        &app,
        post("/api/attendance", &staff_token("north"), body).to_request(),
    )
    .await;
    assert_eq!(resp["data"]["errors"], json!(["Access denied for student s1"]));

    let body = json!({"date": "2024-03-11", "records": [{"studentId": "s1", "status": "absent"}]});
    let resp: Value = test::call_and_read_body_json(
        &app,
        post("/api/attendance", &staff_token("south"), body).to_request(),
    )
    .await;
    assert_eq!(resp["data"]["saved"][0]["centerId"], "south");
    assert_eq!(resp["data"]["saved"][0]["studentName"], "Amina Yusuf-Ali");

    // the earlier mark keeps the center it was recorded under
    let old_day: Value = test::call_and_read_body_json(
        &app,
        get("/api/attendance?date=2024-03-10", &staff_token("north")).to_request(),
    )
    .await;
    assert_eq!(old_day["data"][0]["studentId"], "s1");
}

#[actix_web::test]
async fn update_validates_fields_and_can_deactivate() {
    let state = TestState::new();
    state.add_student("s1", "Amina", "Yusuf", "north").await;
    let app = test_app!(state);
    let token = staff_token("north");

    let resp = test::call_service(
        &app,
        put("/api/students/s1", &token, json!({"firstName": ""})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        put("/api/students/s1", &token, json!({"status": "graduated"})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::call_and_read_body_json(
        &app,
        put(
            "/api/students/s1",
            &token,
            json!({"status": "inactive", "centerId": "north"}),
        )
        .to_request(),
    )
    .await;
    assert_eq!(body["data"]["status"], "inactive");

    let inactive: Value = test::call_and_read_body_json(
        &app,
        get("/api/students?status=inactive", &token).to_request(),
    )
    .await;
    assert_eq!(inactive["total"], 1);
}
