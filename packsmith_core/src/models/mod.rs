pub mod modpacks;
