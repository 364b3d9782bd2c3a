/*!
# School Attendance Service

Attendance tracking for a school, with a spreadsheet as the system of record.

## Overview

Teachers log in with a username/password pair kept in a credential sheet,
view the roster of the classes assigned to them, and submit attendance marks
that are written back into the class sheets. Students marked absent trigger an
email to their guardian.

## Spreadsheet layout

- **Credential sheet** (`User`): username, password, then up to seven class
  sheet names (columns A–I).
- **Class sheets**: row 1 is `RollNumber | Name | Email | Section` followed by
  one label per recorded date (`YYYY-MM-DD`); rows 2+ hold one student each,
  with that student's status under every date column.
- **Audit sheet** (`Activity Sheet`): append-only log of every mark
  (date, recorded by, roll number, name, section, status).

## Marking protocol

1. Find the column labelled with today's date (+05:30), appending it to the
   header row if it is new. An existing label is never rewritten.
2. Re-read the roster and map every submitted roll number to its row. An
   unknown roll number aborts before any status cell is written.
3. Write every status cell in one batch.
4. Send absence notices on detached tasks; failures are only logged.
5. Append one audit row per mark.

Header creation assumes one writer per class sheet at a time.

## Modules

- **sheet**: A1 addressing (column labels, ranges)
- **store**: the `TabularStore` trait with in-memory and Google Sheets backends
- **saving**: gzip snapshot persistence for the in-memory store
- **roster**: roster rows and reads
- **columns**: date-column resolution and the attendance date
- **marking**: attendance writes and audit rows
- **login**: credential checks
- **mailer**: absence notices
- **config**, **app**: server configuration and HTTP routes (feature `web`)

## REST API Endpoints

- `POST /login` - Validates credentials, returns the user's class sheets
- `GET /attendance/{classSheet}` - Roster rows of a class sheet
- `POST /attendance/mark` - Records attendance for today
*/

pub mod columns;
pub mod error;
pub mod login;
pub mod mailer;
pub mod marking;
pub mod roster;
pub mod saving;
pub mod sheet;
pub mod store;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;

pub use columns::*;
pub use error::*;
pub use login::*;
pub use mailer::*;
pub use marking::*;
pub use roster::*;
pub use store::TabularStore;
