use std::fmt;

#[derive(Debug)]
pub enum StoreErr {
    PgPool(r2d2::Error),
    Pg(postgres::Error),
    Unavailable(String),
}

impl std::error::Error for StoreErr {}

impl fmt::Display for StoreErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use StoreErr::*;
        let msg = match self {
            PgPool(e) => format!("{}", e),
            Pg(e) => format!("{}", e),
            Unavailable(reason) => format!("storage is unavailable: {}", reason),
        };
        write!(f, "{}", msg)
    }
}

impl From<r2d2::Error> for StoreErr {
    fn from(e: r2d2::Error) -> Self {
        Self::PgPool(e)
    }
}
impl From<postgres::Error> for StoreErr {
    fn from(e: postgres::Error) -> Self {
        Self::Pg(e)
    }
}
