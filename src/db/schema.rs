//! DDL executed by [`Store::create_schema`](super::Store::create_schema).
//! Every statement is `IF NOT EXISTS`, so running it on each start is safe.

use super::models::Source;

pub const AVERAGE_TABLE: &str = "CREATE TABLE IF NOT EXISTS average_data (
    source              TEXT PRIMARY KEY,
    average_humidity    REAL NOT NULL,
    average_temperature REAL NOT NULL,
    average_light_level REAL NOT NULL
)";

pub const USERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS users (
    id       INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL
)";

const AVERAGE_COLUMNS: &[&str] = &[
    "source",
    "average_humidity",
    "average_temperature",
    "average_light_level",
];
const USER_COLUMNS: &[&str] = &["id", "username", "password"];
const READING_COLUMNS: &[&str] = &["id", "timestamp", "humidity", "temperature", "light_level"];

/// Columns the queries rely on, per table.
pub fn required_columns() -> Vec<(&'static str, &'static [&'static str])> {
    let mut tables = vec![("average_data", AVERAGE_COLUMNS), ("users", USER_COLUMNS)];
    tables.extend(Source::ALL.iter().map(|source| (source.table(), READING_COLUMNS)));
    tables
}

pub fn reading_table(source: Source) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id          INTEGER PRIMARY KEY,
            timestamp   TEXT NOT NULL,
            humidity    REAL NOT NULL,
            temperature REAL NOT NULL,
            light_level REAL NOT NULL
        )",
        table = source.table()
    )
}

pub fn timestamp_index(source: Source) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {table}_timestamp_idx ON {table} (timestamp, id)",
        table = source.table()
    )
}

/// Replaces the source's snapshot row with the fresh table mean after every
/// insert. The trigger body runs inside the inserting statement, so a failed
/// insert never leaves a half-updated snapshot.
pub fn average_trigger(source: Source) -> String {
    format!(
        "CREATE TRIGGER IF NOT EXISTS update_average_{table}
        AFTER INSERT ON {table}
        BEGIN
            DELETE FROM average_data WHERE source = '{source}';
            INSERT INTO average_data (source, average_humidity, average_temperature, average_light_level)
            SELECT '{source}', ROUND(AVG(humidity), 2), ROUND(AVG(temperature), 2), ROUND(AVG(light_level), 2)
            FROM {table};
        END",
        table = source.table(),
        source = source,
    )
}
