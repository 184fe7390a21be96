//! In-process stand-in for an APplus application server.
//!
//! `FakeAppServer` answers the SOAP calls the library makes and executes
//! useXML rows against a SQLite database laid out like the APplus tables
//! used in the tests.
#![allow(dead_code)]

use anyhow::Result;
use applus::api::{SoapCall, SoapTransport};
use applus::db::SqliteDatabase;
use applus::{Config, Database, Error, FieldValue, RemoteFailure, Session};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

pub const TENANT: &str = "TEST";

const CONFIG: &str = r#"
appserver:
  server: "fake-appserver"
  port: 2037
  user: "test.user"
  env: "test-umgebung"
  tenant: "TEST"
webserver:
  baseurl: "http://fake-webserver/APplusTest6/"
dbserver:
  url: "sqlite::memory:"
"#;

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE ARTIKEL (
        ID INTEGER PRIMARY KEY AUTOINCREMENT,
        MANDANT TEXT NOT NULL DEFAULT 'TEST',
        ARTIKEL TEXT NOT NULL,
        NAME TEXT,
        PREIS REAL,
        SACHGRUPPENKLASSE TEXT,
        GUID TEXT NOT NULL DEFAULT (lower(hex(randomblob(16)))),
        TIMESTAMP INTEGER NOT NULL DEFAULT 1,
        UNIQUE (MANDANT, ARTIKEL)
    )",
    "CREATE TABLE APLAN (
        ID INTEGER PRIMARY KEY AUTOINCREMENT,
        MANDANT TEXT NOT NULL DEFAULT 'TEST',
        APLAN TEXT NOT NULL,
        NAME TEXT,
        GUID TEXT NOT NULL DEFAULT (lower(hex(randomblob(16)))),
        TIMESTAMP INTEGER NOT NULL DEFAULT 1,
        UNIQUE (MANDANT, APLAN)
    )",
    "CREATE TABLE APLANPOS (
        ID INTEGER PRIMARY KEY AUTOINCREMENT,
        MANDANT TEXT NOT NULL DEFAULT 'TEST',
        APLAN TEXT NOT NULL,
        AG INTEGER NOT NULL,
        NAME TEXT,
        GUID TEXT NOT NULL DEFAULT (lower(hex(randomblob(16)))),
        TIMESTAMP INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE STUELI (
        ID INTEGER PRIMARY KEY AUTOINCREMENT,
        MANDANT TEXT NOT NULL DEFAULT 'TEST',
        STUELI TEXT NOT NULL,
        BEZEICHNUNG TEXT,
        GUID TEXT NOT NULL DEFAULT (lower(hex(randomblob(16)))),
        TIMESTAMP INTEGER NOT NULL DEFAULT 1,
        UNIQUE (MANDANT, STUELI)
    )",
    "CREATE TABLE STUELIPOS (
        ID INTEGER PRIMARY KEY AUTOINCREMENT,
        MANDANT TEXT NOT NULL DEFAULT 'TEST',
        STUELI TEXT NOT NULL,
        POSITION INTEGER NOT NULL,
        ELEMENT TEXT,
        MENGE REAL,
        MENGE2 REAL GENERATED ALWAYS AS (MENGE * 2) VIRTUAL,
        GUID TEXT NOT NULL DEFAULT (lower(hex(randomblob(16)))),
        TIMESTAMP INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE SACHGRUPPENKLASSEPOS (
        ID INTEGER PRIMARY KEY AUTOINCREMENT,
        MANDANT TEXT NOT NULL DEFAULT 'TEST',
        SACHGRUPPENKLASSE TEXT NOT NULL,
        TABELLE TEXT NOT NULL,
        SACHGRUPPE TEXT NOT NULL,
        TIMESTAMP INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE SACHWERT (
        ID INTEGER PRIMARY KEY AUTOINCREMENT,
        MANDANT TEXT NOT NULL DEFAULT 'TEST',
        TABELLE TEXT NOT NULL,
        INSTANZGUID TEXT NOT NULL,
        SACHGRUPPENKLASSE TEXT,
        SACHGRUPPE TEXT NOT NULL,
        WERT TEXT,
        GUID TEXT NOT NULL DEFAULT (lower(hex(randomblob(16)))),
        TIMESTAMP INTEGER NOT NULL DEFAULT 1,
        UNIQUE (MANDANT, TABELLE, INSTANZGUID, SACHGRUPPE)
    )",
];

pub fn test_config() -> Config {
    Config::from_yaml_str(CONFIG).expect("test config parses")
}

/// One row element of a useXML document.
struct UseXmlDocument {
    command: String,
    table: String,
    fields: Vec<(String, FieldValue)>,
}

impl UseXmlDocument {
    fn parse(xml: &str) -> std::result::Result<Self, String> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| e.to_string())?;
        let row = doc.root_element();
        if !row.has_tag_name("row") {
            return Err(format!("unexpected root element {}", row.tag_name().name()));
        }
        let command = row.attribute("cmd").ok_or("row without cmd")?.to_string();
        let table = row.attribute("table").ok_or("row without table")?.to_string();
        let fields = row
            .children()
            .filter(|n| n.is_element())
            .map(|n| {
                let value = match n.text() {
                    Some(text) => FieldValue::Text(text.to_string()),
                    None => FieldValue::Null,
                };
                (n.tag_name().name().to_string(), value)
            })
            .collect();
        Ok(Self { command, table, fields })
    }

    fn take(&mut self, name: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(index).1)
    }
}

pub struct FakeAppServer {
    db: Arc<SqliteDatabase>,
    numbers: AtomicI64,
    failing_tables: Mutex<HashSet<String>>,
    calls: Mutex<Vec<SoapCall>>,
}

impl FakeAppServer {
    pub fn new(db: Arc<SqliteDatabase>) -> Self {
        Self {
            db,
            numbers: AtomicI64::new(0),
            failing_tables: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Rejects every useXML row for `table` with a server fault.
    pub fn fail_on(&self, table: &str) {
        self.failing_tables.lock().unwrap().insert(table.to_uppercase());
    }

    pub fn calls(&self, method: &str) -> Vec<SoapCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    async fn use_xml(&self, xml: &str) -> std::result::Result<Option<String>, String> {
        let mut row = UseXmlDocument::parse(xml)?;
        if self.failing_tables.lock().unwrap().contains(&row.table) {
            return Err(format!("Änderungen an {} sind gesperrt", row.table));
        }

        match row.command.as_str() {
            "insert" => {
                let sql = if row.fields.is_empty() {
                    format!("INSERT INTO {} DEFAULT VALUES RETURNING ID", row.table)
                } else {
                    let names: Vec<&str> = row.fields.iter().map(|(n, _)| n.as_str()).collect();
                    let marks = vec!["?"; names.len()].join(", ");
                    format!("INSERT INTO {} ({}) VALUES ({}) RETURNING ID", row.table, names.join(", "), marks)
                };
                let values: Vec<FieldValue> = row.fields.iter().map(|(_, v)| v.clone()).collect();
                let result = self.db.query(&sql, &values).await.map_err(|e| e.to_string())?;
                let id = result.single_value().and_then(FieldValue::as_i64).ok_or("insert returned no ID")?;
                Ok(Some(id.to_string()))
            }
            "update" | "delete" => {
                let id = row.take("ID").and_then(|v| v.as_i64()).ok_or("row without ID")?;
                let timestamp = row
                    .take("TIMESTAMP")
                    .and_then(|v| v.as_str().and_then(|t| i64::from_str_radix(t, 16).ok()))
                    .ok_or("row without TIMESTAMP")?;

                let (sql, mut values) = if row.command == "delete" {
                    (format!("DELETE FROM {} WHERE ID = ? AND TIMESTAMP = ?", row.table), Vec::new())
                } else {
                    let mut sets: Vec<String> = row.fields.iter().map(|(n, _)| format!("{} = ?", n)).collect();
                    sets.push("TIMESTAMP = TIMESTAMP + 1".to_string());
                    let values = row.fields.iter().map(|(_, v)| v.clone()).collect();
                    (format!("UPDATE {} SET {} WHERE ID = ? AND TIMESTAMP = ?", row.table, sets.join(", ")), values)
                };
                values.push(FieldValue::Int(id));
                values.push(FieldValue::Int(timestamp));

                let changed = self.db.execute(&sql, &values).await.map_err(|e| e.to_string())?;
                if changed == 0 {
                    return Err(format!("{} ID {} wurde zwischenzeitlich geändert", row.table, id));
                }
                Ok(None)
            }
            other => Err(format!("unknown command {}", other)),
        }
    }
}

#[async_trait]
impl SoapTransport for FakeAppServer {
    async fn invoke(&self, call: &SoapCall) -> applus::Result<Option<String>> {
        self.calls.lock().unwrap().push(call.clone());
        let service = call.service.to_string();
        let fault = |msg: String| Error::remote(&service, &call.method, RemoteFailure::Fault(msg));

        match (service.as_str(), call.method.as_str()) {
            ("p2system/Nummer", "nextNumber") => {
                let n = self.numbers.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Some(format!("N{:05}", n)))
            }
            ("p2core/Table", "getCompleteSQL") => Ok(call.text_param(0).map(str::to_string)),
            ("p2script/ScriptTool", "getCurrentClientProperty") => match call.text_param(0) {
                Some("MANDANTID") => Ok(Some(TENANT.to_string())),
                _ => Ok(None),
            },
            ("p2script/ScriptTool", "getXMLDefinition2") => Ok(None),
            ("p2core/XML", "useXML") => self
                .use_xml(call.text_param(0).unwrap_or_default())
                .await
                .map_err(fault),
            (_, method) => Err(fault(format!("no such method {}", method))),
        }
    }

    fn endpoint(&self) -> String {
        "fake://appserver".to_string()
    }
}

/// A fake server together with its database and a session on both.
pub struct TestSystem {
    pub server: Arc<FakeAppServer>,
    pub db: Arc<SqliteDatabase>,
    pub session: Session,
}

pub async fn test_system() -> Result<TestSystem> {
    let db = Arc::new(SqliteDatabase::connect("sqlite::memory:").await?);
    for statement in SCHEMA {
        db.execute(statement, &[]).await?;
    }
    let server = Arc::new(FakeAppServer::new(db.clone()));
    let session = Session::from_parts(test_config(), server.clone(), db.clone());
    Ok(TestSystem { server, db, session })
}

impl TestSystem {
    pub async fn count(&self, table: &str, condition: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", table, condition);
        let result = self.db.query(&sql, &[]).await?;
        Ok(result.single_value().and_then(FieldValue::as_i64).unwrap_or(0))
    }

    /// Article `key` with a work plan of one step, a two-line bill of
    /// materials and two attribute values, one of them empty.
    pub async fn seed_article(&self, key: &str, name: &str) -> Result<()> {
        let guid = format!("guid-{}", key.to_lowercase());
        let statements: Vec<(&str, Vec<FieldValue>)> = vec![
            (
                "INSERT INTO ARTIKEL (ARTIKEL, NAME, PREIS, SACHGRUPPENKLASSE, GUID) VALUES (?, ?, ?, 'SCHRAUBE', ?)",
                vec![key.into(), name.into(), 12.5.into(), guid.as_str().into()],
            ),
            ("INSERT INTO APLAN (APLAN, NAME) VALUES (?, ?)", vec![key.into(), name.into()]),
            ("INSERT INTO APLANPOS (APLAN, AG, NAME) VALUES (?, 10, 'Drehen')", vec![key.into()]),
            ("INSERT INTO STUELI (STUELI, BEZEICHNUNG) VALUES (?, ?)", vec![key.into(), name.into()]),
            (
                "INSERT INTO STUELIPOS (STUELI, POSITION, ELEMENT, MENGE) VALUES (?, 1, 'M8', 4)",
                vec![key.into()],
            ),
            (
                "INSERT INTO STUELIPOS (STUELI, POSITION, ELEMENT, MENGE) VALUES (?, 2, 'U8', 4)",
                vec![key.into()],
            ),
            (
                "INSERT INTO SACHGRUPPENKLASSEPOS (SACHGRUPPENKLASSE, TABELLE, SACHGRUPPE) VALUES
                 ('SCHRAUBE', 'ARTIKEL', 'LAENGE'), ('SCHRAUBE', 'ARTIKEL', 'NORM')",
                vec![],
            ),
            (
                "INSERT INTO SACHWERT (TABELLE, INSTANZGUID, SACHGRUPPENKLASSE, SACHGRUPPE, WERT) VALUES
                 ('ARTIKEL', ?, 'SCHRAUBE', 'LAENGE', '40'), ('ARTIKEL', ?, 'SCHRAUBE', 'NORM', '')",
                vec![guid.as_str().into(), guid.as_str().into()],
            ),
        ];
        for (sql, params) in statements {
            self.db.execute(sql, &params).await?;
        }
        Ok(())
    }
}
