//! Session cookie loading for logged-in crawling.
//!
//! Authentication is never negotiated: session material arrives pre-made as
//! a Netscape-format cookies.txt file and is only parsed and loaded here.

mod cookies;

pub use cookies::{
    CookieError, CookieRecord, load_cookie_file, load_into_jar, parse_cookie_file,
};
