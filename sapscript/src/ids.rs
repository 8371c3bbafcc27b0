//! Element ids of the standard SAP GUI logon and main screens.

pub const MAIN_WINDOW: &str = "wnd[0]";
pub const POPUP_WINDOW: &str = "wnd[1]";

pub const CLIENT_FIELD: &str = "wnd[0]/usr/txtRSYST-MANDT";
pub const USER_FIELD: &str = "wnd[0]/usr/txtRSYST-BNAME";
pub const PASSWORD_FIELD: &str = "wnd[0]/usr/pwdRSYST-BCODE";
pub const LANGUAGE_FIELD: &str = "wnd[0]/usr/txtRSYST-LANGU";

/// Command field in the system toolbar.
pub const OK_CODE_FIELD: &str = "wnd[0]/tbar[0]/okcd";

/// Toolbar button that only exists once the user is logged in.
pub const LOGGED_IN_MARKER: &str = "wnd[0]/tbar[0]/btn[15]";

// Relative to the popup window.
pub const NEW_PASSWORD_LABEL: &str = "usr/lblRSYST-NCODE_TEXT";
pub const NEW_PASSWORD_FIELD: &str = "usr/pwdRSYST-NCODE";
pub const CONFIRM_PASSWORD_FIELD: &str = "usr/pwdRSYST-NCOD2";
pub const POPUP_CONFIRM_BUTTON: &str = "tbar[0]/btn[0]";

pub const MULTI_LOGON_TERMINATE_OTHERS: &str = "wnd[1]/usr/radMULTI_LOGON_OPT1";
pub const MULTI_LOGON_CONFIRM: &str = "wnd[1]/tbar[0]/btn[0]";

/// Transaction code that ends the session.
pub const LOGOFF_COMMAND: &str = "/nex";

/// Size of the main working pane after connecting, in characters.
pub const WORKING_PANE_SIZE: (u32, u32) = (169, 30);
