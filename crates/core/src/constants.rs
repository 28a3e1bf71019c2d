/// Constants used throughout the stagecrypt codebase
// Scalar tags
pub const ENCRYPT_TAG: &str = ":encrypt:";
pub const DECRYPT_TAG: &str = ":decrypt:";

// Stage-override mapping keys start with this marker
pub const STAGE_MARKER: char = '+';

// Default file names
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_ENVIRONMENTS_FILE: &str = "environments.yml";
pub const EDIT_TEMP_FILE: &str = ".stagecrypt_edit_tmp";

// Placeholder written by `export` when no config file exists yet
pub const KEY_PLACEHOLDER: &str = "enter-key-name-here";

// Environment variable names
pub const STAGECRYPT_LOG_VAR: &str = "STAGECRYPT_LOG";
pub const STAGECRYPT_CONFIG_VAR: &str = "STAGECRYPT_CONFIG";
pub const STAGECRYPT_ENVIRONMENTS_VAR: &str = "STAGECRYPT_ENVIRONMENTS";
pub const STAGECRYPT_EDITOR_VAR: &str = "STAGECRYPT_EDITOR";
pub const DEFAULT_EDITOR: &str = "vi";

// Key service limits (KMS accepts at most 4096 bytes of plaintext per call)
pub const DEFAULT_CHUNK_SIZE: usize = 4096;
pub const MIN_CHUNK_SIZE: usize = 4;
pub const ALIAS_PREFIX: &str = "alias/";

// Parameter store limits
pub const PARAMETER_NAME_PATTERN: &str = r"^/[a-zA-Z0-9_.\-/]*$";
pub const MAX_PARAMETER_HIERARCHY: usize = 15;
