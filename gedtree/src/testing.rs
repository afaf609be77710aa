//! Grammar fixtures shared by the unit tests.

use crate::schema::GrammarSchemaStore;
use std::sync::Arc;

pub(crate) const HEADER: &str =
    "GEDCOM_VERSION=5.5.1\nGEDCOM_SOURCE=test\nGEDCOM_DESCRIPTION=test grammar\n";

pub(crate) const FAMILY_GRAMMAR: &str = r#"
GEDCOM_VERSION=5.5.1
GEDCOM_SOURCE=https://example.org/gedcom551
GEDCOM_DESCRIPTION=Test grammar for families
  and individuals

FAMILY :=
n @<XREF:FAM>@ FAM {1:1}
  +1 RESN <RESTRICTION_NOTICE> {0:1}
  +1 [HUSB|WIFE] @<XREF:INDIVIDUAL>@ {0:1}
  +1 CHIL @<XREF:INDIVIDUAL>@ {0:M}
  +1 MARR [Y|<NULL>] {0:1}
    +2 DATE <DATE_VALUE> {0:1}
    +2 PLAC <PLACE_NAME> {0:1}
  +1 <<EVENT_DETAIL>> {0:1}
  +1 <<NOTE_STRUCTURE>> {0:M}
  +1 REFN <USER_REFERENCE_NUMBER> {0:M}
    +2 TYPE <USER_REFERENCE_TYPE> {0:1}

INDIVIDUAL :=
n @<XREF:INDI>@ INDI {1:1}
  +1 NAME <NAME_PERSONAL> {0:M}
    +2 GIVN <NAME_PIECE_GIVEN> {0:1}
    +2 SURN <NAME_PIECE_SURNAME> {0:1}
  +1 SEX <SEX_VALUE> {1:1}
  +1 FAMS @<XREF:FAM>@ {0:M}
  +1 <<NOTE_STRUCTURE>> {0:M}

// Shared event fields
EVENT_DETAIL :=
n TYPE <EVENT_DESCRIPTOR> {0:1}
n DATE <DATE_VALUE> {0:1}
n PLAC <PLACE_NAME> {0:1}
n <<NOTE_STRUCTURE>> {0:M}

NOTE_STRUCTURE :=
[
n NOTE @<XREF:NOTE>@ {1:1}
|
n NOTE [<SUBMITTER_TEXT>|<NULL>] {1:1}
  +1 [CONC|CONT] <SUBMITTER_TEXT> {0:M}
]

NAME_PIECES :=
n NPFX <NAME_PIECE_PREFIX> {0:1}
n GIVN <NAME_PIECE_GIVEN> {0:1}
n SURN <NAME_PIECE_SURNAME> {1:1}
"#;

/// Prefix a grammar body with a valid header
pub(crate) fn grammar(body: &str) -> String {
    format!("{HEADER}{body}")
}

pub(crate) fn family_store() -> Arc<GrammarSchemaStore> {
    Arc::new(GrammarSchemaStore::parse(FAMILY_GRAMMAR).unwrap())
}
