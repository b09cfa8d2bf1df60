//! Grammar registry keyed by file extension

use tree_sitter::Language;

/// AST node kinds that mark symbol boundaries for one grammar family
#[derive(Debug)]
pub struct NodeKinds {
    /// Top-level callables
    pub functions: &'static [&'static str],
    /// Type-like containers whose bodies may hold methods
    pub classes: &'static [&'static str],
    /// Callables bound to a container, wherever they appear
    pub methods: &'static [&'static str],
    /// Transparent wrappers to look through (exports, decorators)
    pub wrappers: &'static [&'static str],
}

/// One registered grammar
pub struct LanguageSpec {
    /// Lowercase language identifier recorded in chunk metadata
    pub name: &'static str,
    language: fn() -> Language,
    pub kinds: &'static NodeKinds,
}

impl LanguageSpec {
    pub fn language(&self) -> Language {
        (self.language)()
    }
}

impl std::fmt::Debug for LanguageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageSpec").field("name", &self.name).finish()
    }
}

static TYPESCRIPT_KINDS: NodeKinds = NodeKinds {
    functions: &["function_declaration", "generator_function_declaration"],
    classes: &[
        "class_declaration",
        "abstract_class_declaration",
        "interface_declaration",
        "enum_declaration",
    ],
    methods: &["method_definition"],
    wrappers: &["export_statement"],
};

static PYTHON_KINDS: NodeKinds = NodeKinds {
    functions: &["function_definition"],
    classes: &["class_definition"],
    methods: &[],
    wrappers: &["decorated_definition"],
};

static RUST_KINDS: NodeKinds = NodeKinds {
    functions: &["function_item"],
    classes: &["struct_item", "enum_item", "trait_item", "impl_item", "union_item"],
    methods: &[],
    wrappers: &[],
};

static GO_KINDS: NodeKinds = NodeKinds {
    functions: &["function_declaration"],
    classes: &["type_declaration"],
    methods: &["method_declaration"],
    wrappers: &[],
};

static JAVA_KINDS: NodeKinds = NodeKinds {
    functions: &[],
    classes: &["class_declaration", "interface_declaration", "enum_declaration"],
    methods: &["method_declaration", "constructor_declaration"],
    wrappers: &[],
};

fn lang_typescript() -> Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn lang_tsx() -> Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

fn lang_python() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

fn lang_rust() -> Language {
    tree_sitter_rust::LANGUAGE.into()
}

fn lang_go() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

fn lang_java() -> Language {
    tree_sitter_java::LANGUAGE.into()
}

struct Registration {
    extension: &'static str,
    spec: LanguageSpec,
}

static REGISTRY: &[Registration] = &[
    Registration {
        extension: "ts",
        spec: LanguageSpec { name: "typescript", language: lang_typescript, kinds: &TYPESCRIPT_KINDS },
    },
    Registration {
        extension: "tsx",
        spec: LanguageSpec { name: "typescript", language: lang_tsx, kinds: &TYPESCRIPT_KINDS },
    },
    Registration {
        extension: "js",
        spec: LanguageSpec { name: "javascript", language: lang_typescript, kinds: &TYPESCRIPT_KINDS },
    },
    Registration {
        extension: "jsx",
        spec: LanguageSpec { name: "javascript", language: lang_tsx, kinds: &TYPESCRIPT_KINDS },
    },
    Registration {
        extension: "py",
        spec: LanguageSpec { name: "python", language: lang_python, kinds: &PYTHON_KINDS },
    },
    Registration {
        extension: "rs",
        spec: LanguageSpec { name: "rust", language: lang_rust, kinds: &RUST_KINDS },
    },
    Registration {
        extension: "go",
        spec: LanguageSpec { name: "go", language: lang_go, kinds: &GO_KINDS },
    },
    Registration {
        extension: "java",
        spec: LanguageSpec { name: "java", language: lang_java, kinds: &JAVA_KINDS },
    },
];

/// Grammar registered for `extension`, if any
pub fn spec_for_extension(extension: &str) -> Option<&'static LanguageSpec> {
    let lower = extension.to_lowercase();
    REGISTRY
        .iter()
        .find(|r| r.extension == lower)
        .map(|r| &r.spec)
}

/// Every extension with a registered grammar
pub fn grammar_extensions() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|r| r.extension)
}
