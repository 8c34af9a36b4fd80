//! End-to-end tests of the REST surface.

mod common;

use common::{spawn_app, APPROVES, REJECTS};
use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};

fn photo_form(bytes: &'static [u8]) -> multipart::Form {
    let part = multipart::Part::bytes(bytes)
        .file_name("proof.jpg")
        .mime_str("image/jpeg")
        .unwrap();
    multipart::Form::new().part("photo", part)
}

#[tokio::test]
async fn verified_photo_completes_the_task_and_keeps_the_evidence() {
    let base = spawn_app(APPROVES).await;
    let http = reqwest::Client::new();

    let state: Value = http.get(format!("{base}/state")).send().await.unwrap().json().await.unwrap();
    assert_eq!(state["total_count"], 5);
    assert_eq!(state["completed_count"], 0);
    assert!(state["active_alarm"].is_null());

    let created = http
        .post(format!("{base}/tasks"))
        .json(&json!({"type": "PILLS", "label": "Evening pills", "scheduled_time": "21:00"}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let task: Value = created.json().await.unwrap();
    let task_id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["type"], "PILLS");
    assert_eq!(task["scheduled_time"], "21:00");

    let trigger = http
        .post(format!("{base}/alarm/trigger/{task_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(trigger.status(), StatusCode::OK);

    let second = http
        .post(format!("{base}/alarm/test"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let photo = http
        .post(format!("{base}/alarm/photo"))
        .multipart(photo_form(b"\xFF\xD8\xFFjpeg"))
        .send()
        .await
        .unwrap();
    assert_eq!(photo.status(), StatusCode::OK);
    let outcome: Value = photo.json().await.unwrap();
    assert_eq!(outcome["status"], "verified");
    assert_eq!(outcome["notified"], true);
    assert_eq!(outcome["verdict"]["reason"], "Pill in hand.");

    let state: Value = http.get(format!("{base}/state")).send().await.unwrap().json().await.unwrap();
    assert!(state["active_alarm"].is_null());
    assert_eq!(state["completed_count"], 1);
    assert_eq!(state["total_count"], 6);
    assert_eq!(state["notice"]["kind"], "whatsapp");

    let history: Value = http.get(format!("{base}/history")).send().await.unwrap().json().await.unwrap();
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    assert_eq!(history[0]["id"], task_id.as_str());
    assert!(history[0]["verified_at"].is_string());

    let evidence = http
        .get(format!("{base}/tasks/{task_id}/photo"))
        .send()
        .await
        .unwrap();
    assert_eq!(evidence.status(), StatusCode::OK);
    assert_eq!(
        evidence.headers()[reqwest::header::CONTENT_TYPE],
        "image/jpeg"
    );
    assert_eq!(evidence.bytes().await.unwrap().as_ref(), b"\xFF\xD8\xFFjpeg");

    let again = http
        .post(format!("{base}/alarm/trigger/{task_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn rejected_photo_keeps_the_alarm_until_cancelled() {
    let base = spawn_app(REJECTS).await;
    let http = reqwest::Client::new();

    let no_alarm = http
        .post(format!("{base}/alarm/photo"))
        .multipart(photo_form(b"jpeg"))
        .send()
        .await
        .unwrap();
    assert_eq!(no_alarm.status(), StatusCode::CONFLICT);

    let raised: Value = http
        .post(format!("{base}/alarm/test"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = raised["task_id"].as_str().unwrap().to_string();

    let photo: Value = http
        .post(format!("{base}/alarm/photo"))
        .multipart(photo_form(b"jpeg"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(photo["status"], "rejected");
    assert_eq!(photo["verdict"]["verified"], false);

    let state: Value = http.get(format!("{base}/state")).send().await.unwrap().json().await.unwrap();
    assert_eq!(state["active_alarm"]["task_id"], task_id.as_str());
    assert_eq!(state["notice"]["kind"], "error");
    assert_eq!(
        state["notice"]["message"],
        "Could not verify: The image is blurry. Please take another photo."
    );

    let cancel = http.post(format!("{base}/alarm/cancel")).send().await.unwrap();
    assert_eq!(cancel.status(), StatusCode::NO_CONTENT);
    let cancel_again = http.post(format!("{base}/alarm/cancel")).send().await.unwrap();
    assert_eq!(cancel_again.status(), StatusCode::CONFLICT);

    let state: Value = http.get(format!("{base}/state")).send().await.unwrap().json().await.unwrap();
    assert!(state["active_alarm"].is_null());
    assert_eq!(state["completed_count"], 0);
    assert_eq!(state["notice"]["kind"], "info");

    let cleared = http.delete(format!("{base}/notice")).send().await.unwrap();
    assert_eq!(cleared.status(), StatusCode::NO_CONTENT);
    let state: Value = http.get(format!("{base}/state")).send().await.unwrap().json().await.unwrap();
    assert!(state["notice"].is_null());
}

#[tokio::test]
async fn editing_tasks_and_profile() {
    let base = spawn_app(APPROVES).await;
    let http = reqwest::Client::new();
    let unknown = "00000000-0000-0000-0000-000000000000";

    let tasks: Value = http.get(format!("{base}/tasks")).send().await.unwrap().json().await.unwrap();
    let first_id = tasks[0]["id"].as_str().unwrap().to_string();
    assert_eq!(tasks[0]["phase"], "pending");

    let patched = http
        .patch(format!("{base}/tasks/{first_id}"))
        .json(&json!({"label": "Blood pressure pills", "scheduled_time": "07:45"}))
        .send()
        .await
        .unwrap();
    assert_eq!(patched.status(), StatusCode::OK);
    let patched: Value = patched.json().await.unwrap();
    assert_eq!(patched["label"], "Blood pressure pills");
    assert_eq!(patched["scheduled_time"], "07:45");
    assert_eq!(patched["completed"], false);

    let bad_time = http
        .patch(format!("{base}/tasks/{first_id}"))
        .json(&json!({"scheduled_time": "25:00"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_time.status(), StatusCode::BAD_REQUEST);

    for response in [
        http.patch(format!("{base}/tasks/{unknown}")).json(&json!({"label": "x"})).send().await.unwrap(),
        http.delete(format!("{base}/tasks/{unknown}")).send().await.unwrap(),
        http.get(format!("{base}/tasks/{unknown}/photo")).send().await.unwrap(),
        http.post(format!("{base}/alarm/trigger/{unknown}")).send().await.unwrap(),
    ] {
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    let deleted = http.delete(format!("{base}/tasks/{first_id}")).send().await.unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let tasks: Value = http.get(format!("{base}/tasks")).send().await.unwrap().json().await.unwrap();
    assert_eq!(tasks.as_array().map(Vec::len), Some(4));

    let profile = json!({"user_name": "Carmen", "contact_name": "Lucia (daughter)", "contact_phone": "+34611111111"});
    let saved = http.put(format!("{base}/profile")).json(&profile).send().await.unwrap();
    assert_eq!(saved.status(), StatusCode::OK);
    let fetched: Value = http.get(format!("{base}/profile")).send().await.unwrap().json().await.unwrap();
    assert_eq!(fetched, profile);

    let blank = http
        .put(format!("{base}/profile"))
        .json(&json!({"user_name": "", "contact_name": "x", "contact_phone": "y"}))
        .send()
        .await
        .unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_alarm_rings_a_finished_task_and_can_be_dismissed() {
    let base = spawn_app(APPROVES).await;
    let http = reqwest::Client::new();

    let tasks: Value = http.get(format!("{base}/tasks")).send().await.unwrap().json().await.unwrap();
    let ids: Vec<String> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect();
    for id in &ids[1..] {
        let deleted = http.delete(format!("{base}/tasks/{id}")).send().await.unwrap();
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    }

    let first: Value = http.post(format!("{base}/alarm/test")).send().await.unwrap().json().await.unwrap();
    assert_eq!(first["task_id"], ids[0].as_str());
    let photo = http
        .post(format!("{base}/alarm/photo"))
        .multipart(photo_form(b"\xFF\xD8\xFFjpeg"))
        .send()
        .await
        .unwrap();
    let outcome: Value = photo.json().await.unwrap();
    assert_eq!(outcome["status"], "verified");

    // Every task is done; the test alarm still rings the first one.
    let again = http.post(format!("{base}/alarm/test")).send().await.unwrap();
    assert_eq!(again.status(), StatusCode::OK);
    let again: Value = again.json().await.unwrap();
    assert_eq!(again["task_id"], ids[0].as_str());

    let dismissed = http.post(format!("{base}/alarm/dismiss")).send().await.unwrap();
    assert_eq!(dismissed.status(), StatusCode::NO_CONTENT);
    let dismissed_again = http.post(format!("{base}/alarm/dismiss")).send().await.unwrap();
    assert_eq!(dismissed_again.status(), StatusCode::CONFLICT);

    let state: Value = http.get(format!("{base}/state")).send().await.unwrap().json().await.unwrap();
    assert!(state["active_alarm"].is_null());
    assert_eq!(state["completed_count"], 1);
    assert_eq!(state["total_count"], 1);
}
