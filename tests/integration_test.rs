use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::Server;
use predicates::prelude::*;
use tempfile::tempdir;

fn idsentra() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("idsentra"));
    cmd.env_clear();
    cmd
}

#[test]
fn test_config_in_test_mode_prints_placeholders() {
    idsentra()
        .env("NODE_ENV", "test")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("NODE_ENV=test"))
        .stdout(predicate::str::contains("DB_NAME=test_db"))
        .stdout(predicate::str::contains("PORT=3000"))
        .stdout(predicate::str::contains("JWT_SECRET=********"))
        .stdout(predicate::str::contains("test-secret-key").not());
}

#[test]
fn test_config_reads_env_file_as_json() {
    let dir = tempdir().unwrap();
    let env_file = dir.path().join("service.env");
    std::fs::write(
        &env_file,
        "JWT_SECRET=from-file\nDB_NAME=orders\nDB_USER=orders\nDB_PASSWORD=pw\nPORT=8080\n",
    )
    .unwrap();

    idsentra()
        .env("NODE_ENV", "production")
        .env("DB_NAME", "orders_override")
        .arg("--env-file")
        .arg(&env_file)
        .arg("config")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""PORT": 8080"#))
        .stdout(predicate::str::contains(r#""DB_NAME": "orders_override""#))
        .stdout(predicate::str::contains(r#""DB_PASSWORD": "********""#))
        .stderr(predicate::str::contains("Environment configuration loaded"));
}

#[test]
fn test_config_missing_required_key_fails() {
    idsentra()
        .env("NODE_ENV", "production")
        .env("DB_NAME", "orders")
        .env("DB_USER", "orders")
        .env("DB_PASSWORD", "pw")
        .arg("--no-dotenv")
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Required configuration key 'JWT_SECRET' is not set",
        ));
}

#[test]
fn test_request_prints_success_envelope() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/api/users/1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 1, "name": "Ada"}"#)
        .create();

    idsentra()
        .env("NODE_ENV", "production")
        .arg("request")
        .arg("GET")
        .arg("/users/1")
        .arg("--base-url")
        .arg(format!("{}/api", server.url()))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""success": true"#))
        .stdout(predicate::str::contains(r#""message": "Request successful""#))
        .stdout(predicate::str::contains(r#""name": "Ada""#));

    mock.assert();
}

#[test]
fn test_request_client_error_exits_non_zero() {
    let mut server = Server::new();
    let mock = server
        .mock("DELETE", "/users/404")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "User not found"}"#)
        .expect(1)
        .create();

    idsentra()
        .env("NODE_ENV", "production")
        .arg("request")
        .arg("delete")
        .arg("/users/404")
        .arg("--base-url")
        .arg(server.url())
        .arg("--emoji")
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""success": false"#))
        .stdout(predicate::str::contains(r#""message": "User not found""#))
        .stdout(predicate::str::contains(r#""code": "404""#))
        .stdout(predicate::str::contains("stack").not())
        .stderr(predicate::str::contains("❌"))
        .stderr(predicate::str::contains("API Error: DELETE"));

    // Client errors are not retried.
    mock.assert();
}

#[test]
fn test_request_with_invalid_data_fails() {
    idsentra()
        .arg("request")
        .arg("POST")
        .arg("/users")
        .arg("--base-url")
        .arg("http://127.0.0.1:9")
        .arg("--data")
        .arg("{broken")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Request data must be valid JSON"));
}
