pub mod modpacks;
pub mod references;
pub mod users;
