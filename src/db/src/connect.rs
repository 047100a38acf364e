use crate::{repo::MemoryRepo, DbConn};
use anyhow::Result;
use std::env;

pub struct ConnectOptions {
    /// Postgres connection string
    pub pg: Option<String>,
}

impl ConnectOptions {
    fn warn(&self) {
        if cfg!(not(test)) && self.pg.is_none() {
            tracing::warn!(
                "pg url not provided in DATABASE_URL; \
                 participations will not survive restart"
            );
        }
    }
}

pub async fn connect(options: ConnectOptions) -> Result<DbConn> {
    let mem = MemoryRepo::new();
    #[cfg(feature = "postgres")]
    {
        use anyhow::Context as _;
        let pg = match options.pg {
            Some(pg_conn_str) => {
                let conn = crate::repo::PgRepo::new(&pg_conn_str)
                    .await
                    .context("cannot connect to postgres")?;
                Some(conn)
            }
            None => None,
        };
        Ok(DbConn { mem, pg })
    }
    #[cfg(not(feature = "postgres"))]
    {
        if options.pg.is_some() {
            anyhow::bail!("db crate was built without postgres support");
        }
        Ok(DbConn { mem })
    }
}

pub async fn connect_env() -> Result<DbConn> {
    let opts = ConnectOptions {
        pg: env::var("DATABASE_URL").ok(),
    };
    opts.warn();
    connect(opts).await
}

pub fn connect_memory() -> DbConn {
    DbConn {
        mem: MemoryRepo::new(),
        #[cfg(feature = "postgres")]
        pg: None,
    }
}
