pub mod contractdb;
pub mod db;
pub mod negotiationdb;
pub mod userdb;

#[cfg(test)]
pub mod memstore;
