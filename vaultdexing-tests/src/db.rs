use diesel::pg::PgConnection;
use diesel::prelude::*;
use dotenvy::dotenv;
use std::env;

/// Ensures the test database exists, creating it when the first connection
/// attempt fails.
pub fn setup() {
    let db_url = database_url();

    if PgConnection::establish(&db_url).is_err() {
        let (db_name, server_url) = split_database_url(&db_url);

        let mut server_conn = PgConnection::establish(&server_url)
            .unwrap_or_else(|_| panic!("Error connecting to {server_url}"));

        diesel::sql_query(format!(r#"CREATE DATABASE "{db_name}""#))
            .execute(&mut server_conn)
            .unwrap();
    }
}

pub fn database_url() -> String {
    dotenv().ok();

    env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL env variable needs to be set.")
}

fn split_database_url(url: &str) -> (String, String) {
    let mut segments = url.split('/').collect::<Vec<&str>>();

    let db_name = segments
        .pop()
        .expect("TEST_DATABASE_URL needs a database name. See: sample.env");

    (db_name.to_string(), segments.join("/"))
}
