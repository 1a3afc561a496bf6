//! Grammar and document fixtures.

/// Persons and greetings that reference them.
pub const PEOPLE_GRAMMAR: &str = r#"
grammar People

entry Model:
    (persons+=Person | greetings+=Greeting)*;

Person:
    'person' name=ID;

Greeting:
    'hello' person=[Person:ID] '!';

hidden terminal WS: /\s+/;
hidden terminal SL_COMMENT: /\/\/[^\n\r]*/;
terminal ID: /[_a-zA-Z][\w_]*/;
"#;

/// The smallest persons-only language.
pub const PERSONS_GRAMMAR: &str = r#"
grammar Persons
entry Model: persons+=Person*;
Person: 'Person' name=ID;
hidden terminal WS: /\s+/;
terminal ID: /[_a-zA-Z][\w_]*/;
"#;

/// Modules with imports, nested blocks, definitions and uses.
pub const MODULES_GRAMMAR: &str = r#"
grammar Modules

entry Module:
    'module' name=ID imports+=Import* elements+=Element*;

Import:
    'import' module=STRING;

Element:
    Block | Def | Use;

Block:
    'block' name=ID '{' elements+=Element* '}';

Def:
    'def' name=ID;

Use:
    'use' target=[Def:ID];

hidden terminal WS: /\s+/;
hidden terminal ML_COMMENT: /\/\*[\s\S]*?\*\//;
terminal ID: /[_a-zA-Z][\w_]*/;
terminal STRING: /"[^"]*"/;
"#;

pub const GREETINGS: &str = r#"
person Alice
person Bob
hello Alice!
hello Bob!
"#;

/// Module source texts keyed by module name, opened as `file:///{name}.mod`.
pub fn module_uri(name: &str) -> String {
    format!("file:///{name}.mod")
}
