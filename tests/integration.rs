use route_finder::{run_service, DataSource, DatasetStore, ServiceConfig};
use serde_json::{json, Value};
use std::net::TcpListener;

#[actix_rt::test]
async fn health() {
    // Arrange
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/health", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert!(response.status().is_success());
    let text = response.text().await.expect("failed to read body");
    assert_eq!(text, "Ok");
}

#[actix_rt::test]
async fn suggest_hit() {
    // Arrange
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/suggest?q=%20Main%20", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("failed to read body");
    let suggestions = body["suggestions"].as_array().expect("suggestions");
    let routes: Vec<&str> = suggestions
        .iter()
        .map(|s| s["route_id"].as_str().unwrap())
        .collect();
    assert_eq!(routes, ["1", "2", "3"]);
    assert_eq!(suggestions[0]["location"], "Main Gate");
    assert_eq!(suggestions[0]["route_name"], "North Campus Loop");
    assert_eq!(suggestions[0]["target"], "route/1");
    assert_eq!(suggestions[2]["location"], "Old Main Market");
}

#[actix_rt::test]
async fn suggest_empty() {
    // Arrange
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/suggest?q=", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert!(response.status().is_success());
    let text = response.text().await.expect("failed to read body");
    assert_eq!(text, "{\"suggestions\":[]}");
}

#[actix_rt::test]
async fn best_match() {
    // Arrange
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/best_match?q=Science%20Block", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert!(response.status().is_success());
    let text = response.text().await.expect("failed to read body");
    assert_eq!(text, "{\"route_id\":\"1\",\"target\":\"route/1\"}");

    let response = client
        .get(&format!("{}/best_match?q=hall", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    let body: Value = response.json().await.expect("failed to read body");
    assert_eq!(body["route_id"], "2");
}

#[actix_rt::test]
async fn best_match_errors() {
    // Arrange
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let miss = client
        .get(&format!("{}/best_match?q=airport", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    let empty = client
        .get(&format!("{}/best_match?q=%20%20", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert_eq!(miss.status().as_u16(), 404);
    let body: Value = miss.json().await.expect("failed to read body");
    assert_eq!(body, json!({"error": "No matching route found."}));

    assert_eq!(empty.status().as_u16(), 400);
    let body: Value = empty.json().await.expect("failed to read body");
    assert_eq!(body, json!({"error": "Please type your nearest location."}));
}

#[actix_rt::test]
async fn nearest_hit() {
    // Arrange
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/nearest?loc=10.001,10.001", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("failed to read body");
    assert_eq!(body["route_id"], "1");
    assert_eq!(body["location"], "Main Gate");
    assert_eq!(body["target"], "route/1");
    assert!(body["distance_km"].as_f64().unwrap() < 0.2);
}

#[actix_rt::test]
async fn nearest_miss() {
    // Arrange
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let far = client
        .get(&format!("{}/nearest?loc=-170.0,-10.0", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    let tight = client
        .get(&format!("{}/nearest?loc=10.0,10.01&radius_km=0.1", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    for response in [far, tight] {
        assert_eq!(response.status().as_u16(), 404);
        let body: Value = response.json().await.expect("failed to read body");
        assert_eq!(
            body["error"],
            "No route found nearby. Please contact student services."
        );
    }
}

#[actix_rt::test]
async fn nearest_bad_requests() {
    // Arrange
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let no_fix = client
        .get(&format!("{}/nearest", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    let malformed = client
        .get(&format!("{}/nearest?loc=abc", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    let bad_radius = client
        .get(&format!("{}/nearest?loc=10,10&radius_km=-1", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert_eq!(no_fix.status().as_u16(), 422);
    let body: Value = no_fix.json().await.expect("failed to read body");
    assert_eq!(body["error"], "Geolocation not supported.");
    assert_eq!(malformed.status().as_u16(), 400);
    assert_eq!(bad_radius.status().as_u16(), 400);
}

#[actix_rt::test]
async fn bulk() {
    // Arrange
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();
    let locs = "a,10.001,10.001\n\
                b,11.2,12.5\n\
                c,0.0,0.0";

    // Act
    let response = client
        .post(&format!("{}/bulk", &base_url))
        .body(locs)
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert!(response.status().is_success());
    let text = response.text().await.expect("failed to read body");
    assert_eq!(
        text,
        "a,1\n\
         b,3\n\
         c,\n"
    );

    let response = client
        .post(&format!("{}/bulk", &base_url))
        .body("a,10.001")
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 400);
}

#[actix_rt::test]
async fn bulk_parallel() {
    // Arrange
    let store = DatasetStore::new();
    store.load(&DataSource::from("./tests/data/routes.json")).await;
    let base_url = spawn_app_with(store, true);
    let client = reqwest::Client::new();
    let locs = "a,10.001,10.001\n\
                b,11.2,12.5\n\
                c,0.0,0.0\n\
                d,10.009,10.009";

    // Act
    let response = client
        .post(&format!("{}/bulk", &base_url))
        .body(locs)
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert!(response.status().is_success());
    let text = response.text().await.expect("failed to read body");
    assert_eq!(
        text,
        "a,1\n\
         b,3\n\
         c,\n\
         d,2\n"
    );
}

#[actix_rt::test]
async fn unavailable_dataset() {
    // Arrange
    let store = DatasetStore::new();
    store
        .load(&DataSource::from("./tests/data/missing.json"))
        .await;
    let base_url = spawn_app_with(store, false);
    let client = reqwest::Client::new();

    // Act
    let status = client
        .get(&format!("{}/dataset", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    let search = client
        .get(&format!("{}/best_match?q=main", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    let nearby = client
        .get(&format!("{}/nearest?loc=10.001,10.001", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    let suggestions = client
        .get(&format!("{}/suggest?q=main", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    let body: Value = status.json().await.expect("failed to read body");
    assert_eq!(
        body,
        json!({"state": "failed", "routes": 0, "message": "Failed to load route data."})
    );
    for response in [search, nearby] {
        assert_eq!(response.status().as_u16(), 503);
        let body: Value = response.json().await.expect("failed to read body");
        assert_eq!(body, json!({"error": "Failed to load route data."}));
    }
    assert!(suggestions.status().is_success());
    let text = suggestions.text().await.expect("failed to read body");
    assert_eq!(text, "{\"suggestions\":[]}");
}

#[actix_rt::test]
async fn metrics() {
    // Arrange
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    client
        .get(&format!("{}/suggest?q=gate", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    let response = client
        .get(&format!("{}/metrics", &base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert!(response.status().is_success());
    let text = response.text().await.expect("failed to read body");
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("route=\"/suggest\""));
}

async fn spawn_app() -> String {
    let store = DatasetStore::new();
    store.load(&DataSource::from("./tests/data/routes.json")).await;
    assert_eq!(store.get().len(), 4, "could not load route data");
    spawn_app_with(store, false)
}

fn spawn_app_with(store: DatasetStore, parallel: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let config = ServiceConfig {
        store,
        listener,
        max_radius_km: 5.0,
        parallel,
    };
    let server = run_service(config).expect("Failed to start server");
    let _ = tokio::spawn(server);
    format!("http://127.0.0.1:{}", port)
}
