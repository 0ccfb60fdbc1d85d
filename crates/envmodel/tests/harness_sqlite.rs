use std::sync::Arc;

use envmodel::prelude::*;
use envmodel::{SUPERUSER_ID, SqliteAdapter};
use envmodel_testing::{DatabaseConfig, SqliteFileProvisioner, TestDatabase, run_tests};

fn registry() -> ModelRegistry {
    ModelRegistry::new()
        .with_model(
            ModelMeta::new("User", "users")
                .field("name")
                .field("email")
                .many2many("posts", "Post", "user_post_rel", "user_id", "post_id"),
        )
        .with_model(ModelMeta::new("Post", "posts").field("title"))
}

fn seeded(db: &TestDatabase<SqliteFileProvisioner>) -> Arc<Database> {
    let conn = db.connection().expect("connected");
    conn.execute_raw(
        "
        CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, email TEXT);
        CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT);
        CREATE TABLE user_post_rel (user_id INTEGER, post_id INTEGER);
        INSERT INTO users (name, email) VALUES ('Jane A. Smith', 'jane.smith@example.com');
        INSERT INTO posts (title) VALUES ('1st post'), ('2nd post');
        ",
    )
    .expect("seed schema");
    Arc::new(Database::new(conn, Box::new(SqliteAdapter), registry()))
}

fn config() -> DatabaseConfig {
    DatabaseConfig::from_lookup(|_| None).with_driver("sqlite")
}

#[test]
fn harness_runs_environment_scenario_and_drops_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provisioner = SqliteFileProvisioner::new(dir.path());
    let path = provisioner.path_of("hexya_environment_tests");

    run_tests(&config(), "environment", provisioner, |test_db| {
        let db = seeded(test_db);
        db.simulate_in_new_environment(SUPERUSER_ID, |env| {
            let env = env.with_context("key", "context value");
            let users = env.pool("User")?;
            let jane = users.search(&Domain::field("email").equals("jane.smith@example.com"))?;
            assert!(env.cache().data().is_empty());

            let other = db.new_environment(2);
            let moved = jane.with_env(&other);
            assert_eq!(moved.env().uid(), 2);
            assert!(moved.env().context().is_empty());
            assert!(jane.env().context().has_key("key"));

            jane.load(&[])?;
            let (name, hit) = jane.get("name", true)?;
            assert_eq!(name, Value::from("Jane A. Smith"));
            assert!(!hit);

            jane.set_m2m("posts", &[1, 2])?;
            let titles: Vec<Value> = jane
                .related("posts")?
                .fetch_all()?
                .into_iter()
                .map(|mut post| post.remove("title").unwrap_or(Value::Null))
                .collect();
            assert_eq!(titles, vec![Value::from("1st post"), Value::from("2nd post")]);
            Ok(())
        })
        .expect("scenario");
        assert!(path.exists());
    })
    .expect("harness");

    assert!(!path.exists());
}

#[test]
fn harness_config_reads_lookup() {
    let config = DatabaseConfig::from_lookup(|key| match key {
        "HEXYA_DB_DRIVER" => Some("sqlite".to_string()),
        "HEXYA_DB_PREFIX" => Some("ci".to_string()),
        _ => None,
    });
    assert_eq!(config.database_name("sales").unwrap(), "ci_sales_tests");
    assert_eq!(config.adapter().unwrap().dialect(), envmodel::Dialect::Sqlite);
}
