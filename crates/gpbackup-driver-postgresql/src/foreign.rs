use crate::{
    function::resolve,
    query::{options_clause, RowExt},
    PostgreSQL,
};
use gpbackup_core::{
    catalog::{ExternalProtocol, ForeignDataWrapper, ForeignServer, UserMapping},
    driver::Scope,
    filter::extension_filter_clause,
    Result,
};

pub(crate) async fn foreign_data_wrappers(
    db: &PostgreSQL,
    _scope: &Scope,
) -> Result<Vec<ForeignDataWrapper>> {
    if db.version.before("6") {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT oid,
	quote_ident(fdwname) AS name,
	fdwhandler::oid AS handler,
	fdwvalidator::oid AS validator,
	{} AS options
FROM pg_foreign_data_wrapper
WHERE {}
ORDER BY oid",
        options_clause("fdwoptions"),
        extension_filter_clause(""),
    );
    let rows = db.query(&sql).await?;
    let refs = db.function_refs().await?;
    rows.iter()
        .map(|row| {
            Ok(ForeignDataWrapper {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                handler: resolve(refs, row.oid("handler")?),
                validator: resolve(refs, row.oid("validator")?),
                options: row.text("options")?,
            })
        })
        .collect()
}

pub(crate) async fn foreign_servers(db: &PostgreSQL, _scope: &Scope) -> Result<Vec<ForeignServer>> {
    if db.version.before("6") {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT fs.oid,
	quote_ident(fs.srvname) AS name,
	coalesce(fs.srvtype, '') AS type,
	coalesce(fs.srvversion, '') AS version,
	quote_ident(fdw.fdwname) AS fdw,
	{} AS options
FROM pg_foreign_server fs
LEFT JOIN pg_foreign_data_wrapper fdw ON fdw.oid = fs.srvfdw
WHERE {}
ORDER BY fs.oid",
        options_clause("fs.srvoptions"),
        extension_filter_clause("fs"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok(ForeignServer {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                ty: row.text("type")?,
                version: row.text("version")?,
                foreign_data_wrapper: row.text("fdw")?,
                options: row.text("options")?,
            })
        })
        .collect()
}

pub(crate) async fn user_mappings(db: &PostgreSQL, _scope: &Scope) -> Result<Vec<UserMapping>> {
    if db.version.before("6") {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT um.umid AS oid,
	quote_ident(um.usename) AS user,
	quote_ident(um.srvname) AS server,
	{} AS options
FROM pg_user_mappings um
WHERE um.umid NOT IN (select objid from pg_depend where deptype = 'e')
ORDER BY um.usename",
        options_clause("um.umoptions"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok(UserMapping {
                oid: row.oid("oid")?,
                user: row.text("user")?,
                server: row.text("server")?,
                options: row.text("options")?,
            })
        })
        .collect()
}

pub(crate) async fn external_protocols(
    db: &PostgreSQL,
    _scope: &Scope,
) -> Result<Vec<ExternalProtocol>> {
    let sql = "SELECT p.oid,
	quote_ident(p.ptcname) AS name,
	quote_ident(pg_get_userbyid(p.ptcowner)) AS owner,
	p.ptctrusted,
	p.ptcreadfn::oid AS readfn,
	p.ptcwritefn::oid AS writefn,
	p.ptcvalidatorfn::oid AS validatorfn
FROM pg_extprotocol p
ORDER BY p.oid";
    let rows = db.query(sql).await?;
    let refs = db.function_refs().await?;
    rows.iter()
        .map(|row| {
            Ok(ExternalProtocol {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                owner: row.text("owner")?,
                trusted: row.flag("ptctrusted")?,
                read_function: resolve(refs, row.oid("readfn")?),
                write_function: resolve(refs, row.oid("writefn")?),
                validator: resolve(refs, row.oid("validatorfn")?),
                depends_upon: vec![],
            })
        })
        .collect()
}
