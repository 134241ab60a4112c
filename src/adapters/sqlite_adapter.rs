//! SQLite profile store.
//!
//! Wallets and binding settings are stored as JSON text; statuses as their
//! integer code; intervals and plugin jobs as their labels.

use crate::domain::binding::{BindingId, PluginJob};
use crate::domain::error::QuorumError;
use crate::domain::interval::SamplingInterval;
use crate::domain::record::{
    ComponentRecord, PluginRecord, ProfileId, ProfileKey, ProfileRecord, ProfileUpdate, Wallet,
};
use crate::domain::settings;
use crate::domain::status::ProfileStatus;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::ProfileStore;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

const PROFILE_COLUMNS: &str = "id, name, status, balance, wallet, paper_balance, paper_wallet, \
                               buy_limit, sell_limit, schedule_seconds";

fn query_err(e: rusqlite::Error) -> QuorumError {
    QuorumError::DatabaseQuery {
        reason: e.to_string(),
    }
}

/// Profile row as stored, before domain conversion.
struct ProfileRow {
    id: i64,
    name: String,
    status: i64,
    balance: f64,
    wallet: String,
    paper_balance: f64,
    paper_wallet: String,
    buy_limit: f64,
    sell_limit: f64,
    schedule_seconds: i64,
}

impl ProfileRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            status: row.get(2)?,
            balance: row.get(3)?,
            wallet: row.get(4)?,
            paper_balance: row.get(5)?,
            paper_wallet: row.get(6)?,
            buy_limit: row.get(7)?,
            sell_limit: row.get(8)?,
            schedule_seconds: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<ProfileRecord, QuorumError> {
        Ok(ProfileRecord {
            id: self.id,
            status: ProfileStatus::try_from(self.status)?,
            balance: self.balance,
            wallet: serde_json::from_str(&self.wallet)?,
            paper_balance: self.paper_balance,
            paper_wallet: serde_json::from_str(&self.paper_wallet)?,
            buy_limit: self.buy_limit,
            sell_limit: self.sell_limit,
            schedule_seconds: self.schedule_seconds.max(1) as u64,
            name: self.name,
        })
    }
}

type ComponentRow = (i64, i64, String, f64, String, String, String);
type PluginRow = (i64, i64, String, String, String);

fn component_from_row(row: ComponentRow) -> Result<ComponentRecord, QuorumError> {
    let (id, profile_id, name, weight, ticker, interval, settings_text) = row;
    Ok(ComponentRecord {
        id,
        profile_id,
        name,
        weight,
        ticker,
        interval: interval.parse::<SamplingInterval>()?,
        settings: settings::parse(&settings_text)?,
    })
}

fn plugin_from_row(row: PluginRow) -> Result<PluginRecord, QuorumError> {
    let (id, profile_id, name, job, settings_text) = row;
    Ok(PluginRecord {
        id,
        profile_id,
        name,
        job: job.parse::<PluginJob>()?,
        settings: settings::parse(&settings_text)?,
    })
}

fn wallet_json(wallet: &Wallet) -> Result<String, QuorumError> {
    Ok(serde_json::to_string(wallet)?)
}

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, QuorumError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| QuorumError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| QuorumError::Database {
                    reason: e.to_string(),
                })?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, QuorumError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| QuorumError::Database {
                reason: e.to_string(),
            })?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, QuorumError> {
        self.pool.get().map_err(|e: r2d2::Error| QuorumError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), QuorumError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                status INTEGER NOT NULL,
                balance REAL NOT NULL,
                wallet TEXT NOT NULL,
                paper_balance REAL NOT NULL,
                paper_wallet TEXT NOT NULL,
                buy_limit REAL NOT NULL,
                sell_limit REAL NOT NULL,
                schedule_seconds INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_id INTEGER NOT NULL REFERENCES profiles(id),
                name TEXT NOT NULL,
                weight REAL NOT NULL,
                ticker TEXT NOT NULL,
                interval TEXT NOT NULL,
                settings TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS plugins (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_id INTEGER NOT NULL REFERENCES profiles(id),
                name TEXT NOT NULL,
                job TEXT NOT NULL,
                settings TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_components_profile ON components(profile_id);
            CREATE INDEX IF NOT EXISTS idx_plugins_profile ON plugins(profile_id);",
        )
        .map_err(query_err)?;

        Ok(())
    }

    fn profile_exists(conn: &rusqlite::Connection, id: ProfileId) -> Result<bool, QuorumError> {
        let found: Option<i64> = conn
            .query_row("SELECT id FROM profiles WHERE id = ?1", params![id], |row| row.get(0))
            .optional()
            .map_err(query_err)?;
        Ok(found.is_some())
    }
}

impl ProfileStore for SqliteStore {
    fn create_profile(&self, record: &ProfileRecord) -> Result<ProfileRecord, QuorumError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO profiles (name, status, balance, wallet, paper_balance, paper_wallet,
                                   buy_limit, sell_limit, schedule_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.name,
                record.status.code(),
                record.balance,
                wallet_json(&record.wallet)?,
                record.paper_balance,
                wallet_json(&record.paper_wallet)?,
                record.buy_limit,
                record.sell_limit,
                record.schedule_seconds as i64
            ],
        )
        .map_err(query_err)?;

        let mut stored = record.clone();
        stored.id = conn.last_insert_rowid();
        Ok(stored)
    }

    fn get_profile(&self, key: &ProfileKey) -> Result<Option<ProfileRecord>, QuorumError> {
        let conn = self.conn()?;
        let row = match key {
            ProfileKey::Id(id) => conn.query_row(
                &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS),
                params![id],
                ProfileRow::from_row,
            ),
            ProfileKey::Name(name) => conn.query_row(
                &format!("SELECT {} FROM profiles WHERE name = ?1", PROFILE_COLUMNS),
                params![name],
                ProfileRow::from_row,
            ),
        }
        .optional()
        .map_err(query_err)?;

        row.map(ProfileRow::into_record).transpose()
    }

    fn list_profiles(&self) -> Result<Vec<ProfileRecord>, QuorumError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM profiles ORDER BY id", PROFILE_COLUMNS))
            .map_err(query_err)?;
        let rows = stmt.query_map([], ProfileRow::from_row).map_err(query_err)?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row.map_err(query_err)?.into_record()?);
        }
        Ok(profiles)
    }

    fn update_profile(&self, id: ProfileId, update: &ProfileUpdate) -> Result<bool, QuorumError> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(status) = update.status {
            assignments.push("status = ?");
            values.push(Value::Integer(status.code()));
        }
        if let Some(balance) = update.balance {
            assignments.push("balance = ?");
            values.push(Value::Real(balance));
        }
        if let Some(wallet) = &update.wallet {
            assignments.push("wallet = ?");
            values.push(Value::Text(wallet_json(wallet)?));
        }
        if let Some(balance) = update.paper_balance {
            assignments.push("paper_balance = ?");
            values.push(Value::Real(balance));
        }
        if let Some(wallet) = &update.paper_wallet {
            assignments.push("paper_wallet = ?");
            values.push(Value::Text(wallet_json(wallet)?));
        }
        if let Some(limit) = update.buy_limit {
            assignments.push("buy_limit = ?");
            values.push(Value::Real(limit));
        }
        if let Some(limit) = update.sell_limit {
            assignments.push("sell_limit = ?");
            values.push(Value::Real(limit));
        }

        let conn = self.conn()?;
        if assignments.is_empty() {
            return Self::profile_exists(&conn, id);
        }
        values.push(Value::Integer(id));
        let sql = format!("UPDATE profiles SET {} WHERE id = ?", assignments.join(", "));
        let changed = conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(query_err)?;
        Ok(changed > 0)
    }

    fn delete_profile(&self, id: ProfileId) -> Result<bool, QuorumError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute("DELETE FROM components WHERE profile_id = ?1", params![id])
            .map_err(query_err)?;
        tx.execute("DELETE FROM plugins WHERE profile_id = ?1", params![id])
            .map_err(query_err)?;
        let deleted = tx
            .execute("DELETE FROM profiles WHERE id = ?1", params![id])
            .map_err(query_err)?;
        tx.commit().map_err(query_err)?;
        Ok(deleted > 0)
    }

    fn create_component(&self, record: &ComponentRecord) -> Result<ComponentRecord, QuorumError> {
        let conn = self.conn()?;
        if !Self::profile_exists(&conn, record.profile_id)? {
            return Err(QuorumError::DatabaseQuery {
                reason: format!("no profile with id {}", record.profile_id),
            });
        }
        conn.execute(
            "INSERT INTO components (profile_id, name, weight, ticker, interval, settings)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.profile_id,
                record.name,
                record.weight,
                record.ticker,
                record.interval.label(),
                record.settings.to_string()
            ],
        )
        .map_err(query_err)?;

        let mut stored = record.clone();
        stored.id = conn.last_insert_rowid();
        Ok(stored)
    }

    fn get_component(&self, profile_id: ProfileId, id: BindingId) -> Result<Option<ComponentRecord>, QuorumError> {
        let conn = self.conn()?;
        let row: Option<ComponentRow> = conn
            .query_row(
                "SELECT id, profile_id, name, weight, ticker, interval, settings
                 FROM components WHERE profile_id = ?1 AND id = ?2",
                params![profile_id, id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()
            .map_err(query_err)?;
        row.map(component_from_row).transpose()
    }

    fn list_components(&self, profile_id: ProfileId) -> Result<Vec<ComponentRecord>, QuorumError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, profile_id, name, weight, ticker, interval, settings
                 FROM components WHERE profile_id = ?1 ORDER BY id",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![profile_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })
            .map_err(query_err)?;

        let mut components = Vec::new();
        for row in rows {
            components.push(component_from_row(row.map_err(query_err)?)?);
        }
        Ok(components)
    }

    fn update_component(&self, record: &ComponentRecord) -> Result<bool, QuorumError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE components SET name = ?1, weight = ?2, ticker = ?3, interval = ?4, settings = ?5
                 WHERE id = ?6 AND profile_id = ?7",
                params![
                    record.name,
                    record.weight,
                    record.ticker,
                    record.interval.label(),
                    record.settings.to_string(),
                    record.id,
                    record.profile_id
                ],
            )
            .map_err(query_err)?;
        Ok(changed > 0)
    }

    fn delete_component(&self, profile_id: ProfileId, id: BindingId) -> Result<bool, QuorumError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM components WHERE id = ?1 AND profile_id = ?2",
                params![id, profile_id],
            )
            .map_err(query_err)?;
        Ok(deleted > 0)
    }

    fn create_plugin(&self, record: &PluginRecord) -> Result<PluginRecord, QuorumError> {
        let conn = self.conn()?;
        if !Self::profile_exists(&conn, record.profile_id)? {
            return Err(QuorumError::DatabaseQuery {
                reason: format!("no profile with id {}", record.profile_id),
            });
        }
        conn.execute(
            "INSERT INTO plugins (profile_id, name, job, settings) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.profile_id,
                record.name,
                record.job.label(),
                record.settings.to_string()
            ],
        )
        .map_err(query_err)?;

        let mut stored = record.clone();
        stored.id = conn.last_insert_rowid();
        Ok(stored)
    }

    fn get_plugin(&self, profile_id: ProfileId, id: BindingId) -> Result<Option<PluginRecord>, QuorumError> {
        let conn = self.conn()?;
        let row: Option<PluginRow> = conn
            .query_row(
                "SELECT id, profile_id, name, job, settings
                 FROM plugins WHERE profile_id = ?1 AND id = ?2",
                params![profile_id, id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()
            .map_err(query_err)?;
        row.map(plugin_from_row).transpose()
    }

    fn list_plugins(&self, profile_id: ProfileId) -> Result<Vec<PluginRecord>, QuorumError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, profile_id, name, job, settings
                 FROM plugins WHERE profile_id = ?1 ORDER BY id",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![profile_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .map_err(query_err)?;

        let mut plugins = Vec::new();
        for row in rows {
            plugins.push(plugin_from_row(row.map_err(query_err)?)?);
        }
        Ok(plugins)
    }

    fn update_plugin(&self, record: &PluginRecord) -> Result<bool, QuorumError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE plugins SET name = ?1, job = ?2, settings = ?3 WHERE id = ?4 AND profile_id = ?5",
                params![
                    record.name,
                    record.job.label(),
                    record.settings.to_string(),
                    record.id,
                    record.profile_id
                ],
            )
            .map_err(query_err)?;
        Ok(changed > 0)
    }

    fn delete_plugin(&self, profile_id: ProfileId, id: BindingId) -> Result<bool, QuorumError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM plugins WHERE id = ?1 AND profile_id = ?2",
                params![id, profile_id],
            )
            .map_err(query_err)?;
        Ok(deleted > 0)
    }
}
