use gpbackup_core::{
    catalog::{Index, ObjectMetadata, Relation, Schema, SessionGucs, Table},
    toc::{Section, Toc},
    version::DbVersion,
};
use gpbackup_sql::{MetadataWriter, Printer};
use pretty_assertions::assert_eq;

fn make_table(schema: &str, name: &str) -> Table {
    Table {
        relation: Relation::new(16384, schema, name),
        dist_policy: "DISTRIBUTED RANDOMLY".into(),
        ..Table::default()
    }
}

fn slice<'a>(text: &'a str, toc: &Toc, section: Section, i: usize) -> &'a str {
    let entry = &toc.entries(section)[i];
    &text[entry.startbyte as usize..entry.endbyte as usize]
}

#[test]
fn every_entry_replays_its_own_statement() {
    let version = DbVersion::from_release("6.20.0").unwrap();
    let printer = Printer::new(&version);
    let mut toc = Toc::default();

    let owner = ObjectMetadata {
        owner: "gpadmin".into(),
        ..ObjectMetadata::default()
    };
    let schema = Schema {
        oid: 2200,
        name: "sales".into(),
    };
    let table = make_table("sales", "orders");
    let index = Index {
        oid: 1,
        name: "orders_idx".into(),
        owning_schema: "sales".into(),
        owning_table: "orders".into(),
        def: "CREATE INDEX orders_idx ON sales.orders USING btree (id)".into(),
        ..Index::default()
    };

    let mut writer = MetadataWriter::new(Vec::new(), "metadata.sql", &mut toc, Section::Global);
    writer.emit(printer.session_gucs(&SessionGucs::default())).unwrap();
    writer.set_section(Section::Predata);
    writer.emit(printer.create_schema(&schema, &owner)).unwrap();
    writer.emit(printer.create_table(&table, &owner)).unwrap();
    writer.set_section(Section::Postdata);
    writer.emit_all(printer.create_index(&index, &ObjectMetadata::default())).unwrap();
    let text = String::from_utf8(writer.into_inner()).unwrap();

    assert!(slice(&text, &toc, Section::Global, 0).starts_with("SET statement_timeout = 0;"));
    assert_eq!(
        slice(&text, &toc, Section::Predata, 0),
        "\n\nCREATE SCHEMA sales;\n\nALTER SCHEMA sales OWNER TO gpadmin;\n"
    );
    assert_eq!(
        slice(&text, &toc, Section::Predata, 1),
        "\n\nCREATE TABLE sales.orders (\n) DISTRIBUTED RANDOMLY;\n\n\nALTER TABLE sales.orders OWNER TO gpadmin;\n"
    );
    assert_eq!(
        slice(&text, &toc, Section::Postdata, 0),
        "\n\nCREATE INDEX orders_idx ON sales.orders USING btree (id);\n"
    );
    assert_eq!(toc.postdataentries[0].referenceobject, "sales.orders");
    assert!(toc.unresolved_references().is_empty());
}

#[test]
fn public_schema_carries_only_metadata() {
    let version = DbVersion::from_release("7.0.0").unwrap();
    let schema = Schema {
        oid: 2200,
        name: "public".into(),
    };
    let meta = ObjectMetadata {
        comment: "standard public schema".into(),
        ..ObjectMetadata::default()
    };
    assert_eq!(
        Printer::new(&version).create_schema(&schema, &meta).sql,
        "\n\nCOMMENT ON SCHEMA public IS 'standard public schema';\n"
    );
}
