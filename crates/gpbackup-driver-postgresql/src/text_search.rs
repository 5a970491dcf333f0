use crate::{query::RowExt, PostgreSQL};
use gpbackup_core::{
    catalog::{
        TextSearchConfiguration, TextSearchDictionary, TextSearchParser, TextSearchTemplate,
    },
    driver::Scope,
    filter::extension_filter_clause,
    Result,
};
use std::collections::{BTreeMap, HashMap};

/// `regproc::text`, or empty when the function is unset.
fn optional_proc(column: &str) -> String {
    format!("CASE WHEN {column}::regproc::text = '-' THEN '' ELSE {column}::regproc::text END")
}

pub(crate) async fn parsers(db: &PostgreSQL, scope: &Scope) -> Result<Vec<TextSearchParser>> {
    let sql = format!(
        "SELECT p.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(p.prsname) AS name,
	p.prsstart::regproc::text AS startfunc,
	p.prstoken::regproc::text AS tokenfunc,
	p.prsend::regproc::text AS endfunc,
	p.prslextype::regproc::text AS lextypesfunc,
	{} AS headlinefunc
FROM pg_ts_parser p
JOIN pg_namespace n ON n.oid = p.prsnamespace
WHERE {}
AND {}
ORDER BY p.prsname",
        optional_proc("p.prsheadline"),
        scope.schema_clause("n"),
        extension_filter_clause("p"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok(TextSearchParser {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                name: row.text("name")?,
                start_func: row.text("startfunc")?,
                token_func: row.text("tokenfunc")?,
                end_func: row.text("endfunc")?,
                lex_types_func: row.text("lextypesfunc")?,
                headline_func: row.text("headlinefunc")?,
            })
        })
        .collect()
}

pub(crate) async fn templates(db: &PostgreSQL, scope: &Scope) -> Result<Vec<TextSearchTemplate>> {
    let sql = format!(
        "SELECT p.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(p.tmplname) AS name,
	{} AS initfunc,
	p.tmpllexize::regproc::text AS lexizefunc
FROM pg_ts_template p
JOIN pg_namespace n ON n.oid = p.tmplnamespace
WHERE {}
AND {}
ORDER BY p.tmplname",
        optional_proc("p.tmplinit"),
        scope.schema_clause("n"),
        extension_filter_clause("p"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok(TextSearchTemplate {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                name: row.text("name")?,
                init_func: row.text("initfunc")?,
                lexize_func: row.text("lexizefunc")?,
            })
        })
        .collect()
}

pub(crate) async fn dictionaries(
    db: &PostgreSQL,
    scope: &Scope,
) -> Result<Vec<TextSearchDictionary>> {
    let sql = format!(
        "SELECT d.oid,
	quote_ident(dict_ns.nspname) AS schema,
	quote_ident(d.dictname) AS name,
	quote_ident(tmpl_ns.nspname) || '.' || quote_ident(t.tmplname) AS template,
	coalesce(d.dictinitoption, '') AS initoption
FROM pg_ts_dict d
JOIN pg_ts_template t ON t.oid = d.dicttemplate
JOIN pg_namespace tmpl_ns ON tmpl_ns.oid = t.tmplnamespace
JOIN pg_namespace dict_ns ON dict_ns.oid = d.dictnamespace
WHERE {}
AND {}
ORDER BY d.dictname",
        scope.schema_clause("dict_ns"),
        extension_filter_clause("d"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok(TextSearchDictionary {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                name: row.text("name")?,
                template: row.text("template")?,
                init_option: row.text("initoption")?,
            })
        })
        .collect()
}

/// Token type id to alias, for each parser already asked about.
#[derive(Debug, Default)]
struct TokenTypes {
    by_parser: HashMap<u32, HashMap<u32, String>>,
}

impl TokenTypes {
    async fn name(&mut self, db: &PostgreSQL, parser: u32, token: u32) -> Result<String> {
        if !self.by_parser.contains_key(&parser) {
            let sql = format!(
                "SELECT tokid::oid AS tokid, alias FROM pg_catalog.ts_token_type('{parser}'::pg_catalog.oid)"
            );
            let mut aliases = HashMap::new();
            for row in db.query(&sql).await? {
                aliases.insert(row.oid("tokid")?, row.text("alias")?);
            }
            self.by_parser.insert(parser, aliases);
        }
        Ok(self
            .by_parser
            .get(&parser)
            .and_then(|aliases| aliases.get(&token))
            .cloned()
            .unwrap_or_default())
    }
}

pub(crate) async fn configurations(
    db: &PostgreSQL,
    scope: &Scope,
) -> Result<Vec<TextSearchConfiguration>> {
    let mapping_sql = "SELECT m.mapcfg,
	m.maptokentype::oid AS maptokentype,
	m.mapdict::pg_catalog.regdictionary::text AS mapdictname
FROM pg_ts_config_map m
ORDER BY m.mapcfg, m.maptokentype, m.mapseqno";
    let mut mappings: HashMap<u32, Vec<(u32, String)>> = HashMap::new();
    for row in db.query(mapping_sql).await? {
        mappings
            .entry(row.oid("mapcfg")?)
            .or_default()
            .push((row.oid("maptokentype")?, row.text("mapdictname")?));
    }

    let sql = format!(
        "SELECT c.oid,
	quote_ident(cfg_ns.nspname) AS schema,
	quote_ident(c.cfgname) AS name,
	c.cfgparser AS parseroid,
	quote_ident(prs_ns.nspname) || '.' || quote_ident(p.prsname) AS parserfqn
FROM pg_ts_config c
JOIN pg_ts_parser p ON p.oid = c.cfgparser
JOIN pg_namespace cfg_ns ON cfg_ns.oid = c.cfgnamespace
JOIN pg_namespace prs_ns ON prs_ns.oid = p.prsnamespace
WHERE {}
AND {}
ORDER BY c.cfgname",
        scope.schema_clause("cfg_ns"),
        extension_filter_clause("c"),
    );

    let mut tokens = TokenTypes::default();
    let mut configurations = vec![];
    for row in db.query(&sql).await? {
        let oid = row.oid("oid")?;
        let parser = row.oid("parseroid")?;
        let mut token_to_dicts: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (token, dictionary) in mappings.remove(&oid).unwrap_or_default() {
            let name = tokens.name(db, parser, token).await?;
            token_to_dicts.entry(name).or_default().push(dictionary);
        }
        configurations.push(TextSearchConfiguration {
            oid,
            schema: row.text("schema")?,
            name: row.text("name")?,
            parser: row.text("parserfqn")?,
            token_to_dicts,
        });
    }
    Ok(configurations)
}
