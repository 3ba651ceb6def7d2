/*!
# Calculator Service

The server side of a browser calculator with two tools: longest substring
without repeating characters, and maximum path sums over a binary tree sent
as a flat array.

## Architecture

Requests flow through three layers:

### HTTP Layer (`web` feature)
- **Technologies**: axum, tokio, tower-http
- Bearer token check, JSON request/response envelopes, CORS for the browser client
- Batch endpoints run their work on the blocking pool

### Validation Layer
- Rejects empty, oversized or malformed input with a typed reason
- Tokenizes comma-separated tree text (`10,5,null,-3`) the way the client form does

### Engine Layer
- **Substring engine** - sliding window over characters, O(n)
- **Tree engine** - arena reconstruction from complete-tree indexing, then
  two post-order passes (unrestricted path, leaf-to-leaf path)

Each calculation is a pure function of its input. The only shared state is
the in-memory history of archived results.

## Modules

- **validator**: input validation and tree text tokenizing
- **substring**: longest repeat-free substring engine
- **tree**: tree reconstruction and path searches
- **service**: validate-then-compute entry points
- **history**: per-user archive of results
- **config**: environment configuration
- **error**: error taxonomy
- **auth**: bearer token middleware
- **app**: routing and server loop

## REST API Endpoints

- `POST /calculate-substring`, `POST /calculate-tree` - bare results
- `POST /api/substring/calculate`, `POST /api/tree/calculate` - archived results
- `POST /api/substring/batch-calculate`, `POST /api/tree/batch-calculate`
- `POST /api/substring/save`, `POST /api/tree/save` - archive without a calculate call
- `GET /api/substring/history`, `GET /api/tree/history` - paged, date-filtered history per kind
- `DELETE /api/substring/history/{id}`, `DELETE /api/tree/history/{id}`
- `GET|DELETE /api/calculator/history`, `DELETE /api/calculator/history/{id}`
- `GET /api/calculator/stats`, `GET /api/calculator/export`
- `GET /health`
*/

pub mod config;
pub mod error;
pub mod history;
pub mod service;
pub mod substring;
pub mod tree;
pub mod validator;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod auth;

pub use error::{CalcError, EngineError, ValidationError};
pub use service::{calculate_substring, calculate_tree, calculate_tree_text};
pub use substring::SubstringResult;
pub use tree::TreeResult;
pub use validator::Limits;
