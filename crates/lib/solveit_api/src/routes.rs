//! Route paths.

pub const POST_AUTH_SIGN_UP: &str = "/api/auth/sign-up";
pub const POST_AUTH_SIGN_IN: &str = "/api/auth/sign-in";
pub const POST_AUTH_REFRESH_ACCESS: &str = "/api/auth/refresh-access";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const POST_AUTH_CONFIRM_EMAIL: &str = "/api/auth/confirm-email";
pub const POST_AUTH_FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
pub const POST_AUTH_RESET_PASSWORD: &str = "/api/auth/reset-password";
pub const PATCH_AUTH_UPDATE_PASSWORD: &str = "/api/auth/update-password";
pub const POST_AUTH_ADD_PASSWORD: &str = "/api/auth/add-password";
pub const GET_AUTH_ME: &str = "/api/auth/me";
pub const GET_AUTH_PROVIDERS: &str = "/api/auth/providers";
pub const DELETE_AUTH_ACCOUNT: &str = "/api/auth/account";

pub const GET_AUTH_EXT_URL: &str = "/api/auth/ext/{provider}/url";
pub const GET_AUTH_EXT_CALLBACK: &str = "/api/auth/ext/{provider}/callback";
pub const POST_AUTH_EXT_TOKEN: &str = "/api/auth/ext/token";

/// Path scope of the refresh-token cookie.
pub const AUTH_COOKIE_PATH: &str = "/api/auth";
