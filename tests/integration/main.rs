//! Integration tests: login state machine and statement scraping driven
//! through the public `Institution` interface against scripted portal pages.

mod scripted_browser;
mod statements;
