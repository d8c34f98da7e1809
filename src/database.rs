// xbase - a library for reading and writing FoxPro/dBase table files.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! Database containers.
//!
//! A `.DBC` container is itself an ordinary table whose rows describe the
//! database's objects.  Member tables are the rows with
//! `OBJECTTYPE == "Table"`; their `OBJECTNAME` resolves to a `.DBF` beside
//! the container (with `_` mapped back to space, unless disabled) or, for
//! containers not living on a filesystem, through a caller-supplied
//! [TableProvider].
//!
//! The container owns its member tables; members hold no reference back.
//! Closing the container closes every member.

use std::{collections::BTreeMap, path::Path};

use tracing::debug;

use crate::{
    column::Column,
    data::Datum,
    error::{Error, Result},
    table::{OpenOptions, Table},
};

/// Supplies member-table bytes for containers opened from memory.
///
/// Returns `Ok(None)` to skip a member; `Ok(Some((table, memo)))` opens it
/// from the returned buffers.
pub trait TableProvider {
    /// Fetches the raw table and memo contents for `name`.
    fn table(&self, name: &str) -> Result<Option<(Vec<u8>, Option<Vec<u8>>)>>;
}

impl<F> TableProvider for F
where
    F: Fn(&str) -> Result<Option<(Vec<u8>, Option<Vec<u8>>)>>,
{
    fn table(&self, name: &str) -> Result<Option<(Vec<u8>, Option<Vec<u8>>)>> {
        self(name)
    }
}

/// An open database container and its member tables.
pub struct Database {
    container: Table,
    tables: BTreeMap<String, Table>,
}

impl Database {
    /// Opens the container at `path` and every member table beside it.
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !extension.eq_ignore_ascii_case("dbc") {
            return Err(Error::invalid_configuration(format!(
                "{} is not a .DBC container",
                path.display()
            )));
        }
        let convert_underscores = options.convert_underscores();
        let container = options.clone().open(path)?;
        let names = member_names(&container)?;
        let directory = path.parent().unwrap_or_else(|| Path::new("."));

        let mut tables = BTreeMap::new();
        for name in names {
            let file_name = if convert_underscores {
                name.replace('_', " ")
            } else {
                name.clone()
            };
            let member_path = resolve_member(directory, &file_name)
                .ok_or_else(|| Error::no_table_file(format!("{name} in {}", directory.display())))?;
            debug!(name = %name, path = %member_path.display(), "opening member table");
            let table = options.clone().open(&member_path)?;
            tables.insert(name, table);
        }
        Ok(Self { container, tables })
    }

    /// Opens a container held in memory, fetching member tables through
    /// `provider`.  Members the provider returns `None` for are skipped.
    pub fn open_with_provider(
        data: Vec<u8>,
        memo: Option<Vec<u8>>,
        provider: &dyn TableProvider,
        options: OpenOptions,
    ) -> Result<Self> {
        let container = options.clone().open_memory(data, memo)?;
        let names = member_names(&container)?;
        let mut tables = BTreeMap::new();
        for name in names {
            let Some((table_data, memo_data)) = provider.table(&name)? else {
                continue;
            };
            debug!(name = %name, "opening member table from provider");
            let table = options.clone().open_memory(table_data, memo_data)?;
            tables.insert(name, table);
        }
        Ok(Self { container, tables })
    }

    /// Enumerates the member-table names of the container at `path`
    /// without opening any member.
    pub fn names_at(path: impl AsRef<Path>, options: OpenOptions) -> Result<Vec<String>> {
        let container = options.open(path.as_ref())?;
        let names = member_names(&container)?;
        container.close()?;
        Ok(names)
    }

    /// The container table itself.
    pub fn container(&self) -> &Table {
        &self.container
    }

    /// Every member table, keyed by name.
    pub fn tables(&self) -> &BTreeMap<String, Table> {
        &self.tables
    }

    /// The member table called `name`, if the container has one.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Member-table names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// The column lists of every member table.
    pub fn schema(&self) -> BTreeMap<String, Vec<Column>> {
        self.tables
            .iter()
            .map(|(name, table)| {
                let columns = table.columns().iter().cloned().collect();
                (name.clone(), columns)
            })
            .collect()
    }

    /// Closes every member table, then the container.
    pub fn close(&self) -> Result<()> {
        for table in self.tables.values() {
            table.close()?;
        }
        self.container.close()
    }
}

/// Reads the member-table names out of an open container.
fn member_names(container: &Table) -> Result<Vec<String>> {
    let field = container.new_field("OBJECTTYPE", Datum::Text("Table".into()))?;
    let rows = container.search(&field, true)?;
    let mut names = Vec::new();
    for row in rows {
        let name = row.datum_by_name("OBJECTNAME")?.try_text()?;
        let name = name.trim_matches(' ');
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }
    debug!(count = names.len(), "container lists member tables");
    Ok(names)
}

/// Finds `<name>.dbf` under `directory`, tolerating extension case.
fn resolve_member(directory: &Path, name: &str) -> Option<std::path::PathBuf> {
    for extension in ["dbf", "DBF"] {
        let candidate = directory.join(format!("{name}.{extension}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::{
        column::{Column, DataType},
        table::TableBuilder,
    };

    fn build_container(dir: &Path) {
        let container = TableBuilder::new()
            .column(Column::new("OBJECTTYPE", DataType::Character, 10, 0, false).unwrap())
            .column(Column::new("OBJECTNAME", DataType::Character, 20, 0, false).unwrap())
            .create(dir.join("base.dbc"))
            .unwrap();
        for (object_type, object_name) in [
            ("Database", "base"),
            ("Table", "customers"),
            ("Table", "order_lines"),
            ("View", "v_orders"),
        ] {
            let mut row = container
                .new_row(vec![
                    Datum::Text(object_type.into()),
                    Datum::Text(object_name.into()),
                ])
                .unwrap();
            container.append_row(&mut row).unwrap();
        }
        container.close().unwrap();

        for file_name in ["customers", "order lines"] {
            let table = TableBuilder::new()
                .column(Column::new("ID", DataType::Integer, 4, 0, false).unwrap())
                .create(dir.join(format!("{file_name}.dbf")))
                .unwrap();
            let mut row = table.new_row(vec![Datum::Integer(7)]).unwrap();
            table.append_row(&mut row).unwrap();
            table.close().unwrap();
        }
    }

    #[test]
    fn open_resolves_members_beside_the_container() {
        let dir = tempfile::tempdir().unwrap();
        build_container(dir.path());
        let database = Database::open(dir.path().join("base.dbc"), OpenOptions::new()).unwrap();
        assert_eq!(database.names(), vec!["customers", "order_lines"]);
        let customers = database.table("customers").unwrap();
        assert_eq!(customers.record_count(), 1);
        let schema = database.schema();
        assert_eq!(schema["order_lines"][0].name(), "ID");
        database.close().unwrap();
    }

    #[test]
    fn underscore_conversion_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        build_container(dir.path());
        // With conversion disabled, "order_lines" has no file to resolve.
        let result = Database::open(
            dir.path().join("base.dbc"),
            OpenOptions::new().disable_convert_filename_underscores(true),
        );
        assert!(matches!(
            result,
            Err(ref e) if matches!(e.kind(), ErrorKind::NoTableFile(_))
        ));
    }

    #[test]
    fn provider_backed_open() {
        let dir = tempfile::tempdir().unwrap();
        build_container(dir.path());
        let container_bytes = std::fs::read(dir.path().join("base.dbc")).unwrap();
        let customers_bytes = std::fs::read(dir.path().join("customers.dbf")).unwrap();

        let provider = move |name: &str| -> Result<Option<(Vec<u8>, Option<Vec<u8>>)>> {
            if name == "customers" {
                Ok(Some((customers_bytes.clone(), None)))
            } else {
                Ok(None)
            }
        };
        let database =
            Database::open_with_provider(container_bytes, None, &provider, OpenOptions::new())
                .unwrap();
        assert_eq!(database.names(), vec!["customers"]);
        assert_eq!(database.table("customers").unwrap().record_count(), 1);
    }

    #[test]
    fn non_dbc_extension_is_rejected() {
        let result = Database::open("/tmp/whatever.dbf", OpenOptions::new());
        assert!(matches!(
            result,
            Err(ref e) if matches!(e.kind(), ErrorKind::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn names_without_opening_members() {
        let dir = tempfile::tempdir().unwrap();
        build_container(dir.path());
        let names = Database::names_at(dir.path().join("base.dbc"), OpenOptions::new()).unwrap();
        assert_eq!(names, vec!["customers", "order_lines"]);
    }
}
