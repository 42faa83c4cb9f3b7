//! Troff special-character names and their XML renderings.

/// A troff special character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    /// Troff name as used in `\(xx` or `\[name]`.
    pub name: &'static str,
    /// ISO entity name, or `None` when the glyph is plain ASCII.
    pub entity: Option<&'static str>,
    pub codepoint: u32,
}

const fn g(name: &'static str, entity: &'static str, codepoint: u32) -> Glyph {
    Glyph {
        name,
        entity: Some(entity),
        codepoint,
    }
}

const fn ascii(name: &'static str, codepoint: u32) -> Glyph {
    Glyph {
        name,
        entity: None,
        codepoint,
    }
}

static GLYPHS: &[Glyph] = &[
    // Dashes and quotes
    g("em", "mdash", 0x2014),
    g("en", "ndash", 0x2013),
    ascii("hy", 0x2d),
    g("mi", "minus", 0x2212),
    g("lq", "ldquo", 0x201c),
    g("rq", "rdquo", 0x201d),
    g("oq", "lsquo", 0x2018),
    g("cq", "rsquo", 0x2019),
    ascii("aq", 0x27),
    ascii("dq", 0x22),
    g("Fo", "laquo", 0xab),
    g("Fc", "raquo", 0xbb),
    g("fo", "lsaquo", 0x2039),
    g("fc", "rsaquo", 0x203a),
    g("Bq", "bdquo", 0x201e),
    g("bq", "sbquo", 0x201a),
    // Bullets and marks
    g("bu", "bull", 0x2022),
    g("ci", "cir", 0x25cb),
    g("sq", "squ", 0x25a1),
    g("dg", "dagger", 0x2020),
    g("dd", "Dagger", 0x2021),
    g("sc", "sect", 0xa7),
    g("ps", "para", 0xb6),
    g("co", "copy", 0xa9),
    g("rg", "reg", 0xae),
    g("tm", "trade", 0x2122),
    g("de", "deg", 0xb0),
    g("ct", "cent", 0xa2),
    g("Po", "pound", 0xa3),
    g("Ye", "yen", 0xa5),
    g("Eu", "euro", 0x20ac),
    g("eu", "euro", 0x20ac),
    g("OK", "check", 0x2713),
    g("hA", "hArr", 0x21d4),
    // Mathematics
    g("+-", "plusmn", 0xb1),
    g("mu", "times", 0xd7),
    g("di", "divide", 0xf7),
    g("<=", "le", 0x2264),
    g(">=", "ge", 0x2265),
    g("!=", "ne", 0x2260),
    g("==", "equiv", 0x2261),
    g("~=", "cong", 0x2245),
    g("~~", "asymp", 0x2248),
    g("ap", "sim", 0x223c),
    g("if", "infin", 0x221e),
    g("sr", "radic", 0x221a),
    g("pd", "part", 0x2202),
    g("gr", "nabla", 0x2207),
    g("is", "int", 0x222b),
    g("pt", "prop", 0x221d),
    g("es", "empty", 0x2205),
    g("mo", "isin", 0x2208),
    g("sb", "sub", 0x2282),
    g("sp", "sup", 0x2283),
    g("ib", "sube", 0x2286),
    g("ip", "supe", 0x2287),
    g("ca", "cap", 0x2229),
    g("cu", "cup", 0x222a),
    g("no", "not", 0xac),
    g("AN", "and", 0x2227),
    g("OR", "or", 0x2228),
    g("fa", "forall", 0x2200),
    g("te", "exist", 0x2203),
    g("**", "lowast", 0x2217),
    g("12", "frac12", 0xbd),
    g("14", "frac14", 0xbc),
    g("34", "frac34", 0xbe),
    g("S1", "sup1", 0xb9),
    g("S2", "sup2", 0xb2),
    g("S3", "sup3", 0xb3),
    // Arrows
    g("->", "rarr", 0x2192),
    g("<-", "larr", 0x2190),
    g("<>", "harr", 0x2194),
    g("ua", "uarr", 0x2191),
    g("da", "darr", 0x2193),
    g("rA", "rArr", 0x21d2),
    g("lA", "lArr", 0x21d0),
    // Brackets and ASCII stand-ins
    g("la", "lang", 0x2329),
    g("ra", "rang", 0x232a),
    ascii("lB", 0x5b),
    ascii("rB", 0x5d),
    ascii("lC", 0x7b),
    ascii("rC", 0x7d),
    ascii("rs", 0x5c),
    ascii("sl", 0x2f),
    ascii("ba", 0x7c),
    ascii("br", 0x7c),
    ascii("or", 0x7c),
    ascii("ti", 0x7e),
    ascii("ha", 0x5e),
    ascii("ul", 0x5f),
    ascii("ru", 0x5f),
    ascii("at", 0x40),
    ascii("sh", 0x23),
    ascii("Do", 0x24),
    ascii("pl", 0x2b),
    ascii("eq", 0x3d),
    ascii("fm", 0x27),
    g("aa", "acute", 0xb4),
    ascii("ga", 0x60),
    g("a-", "macr", 0xaf),
    g("ad", "uml", 0xa8),
    g("ac", "cedil", 0xb8),
    g("r!", "iexcl", 0xa1),
    g("r?", "iquest", 0xbf),
    g("ss", "szlig", 0xdf),
    g("ff", "fflig", 0xfb00),
    g("fi", "filig", 0xfb01),
    g("fl", "fllig", 0xfb02),
    // Accented letters
    g(":a", "auml", 0xe4),
    g(":o", "ouml", 0xf6),
    g(":u", "uuml", 0xfc),
    g(":A", "Auml", 0xc4),
    g(":O", "Ouml", 0xd6),
    g(":U", "Uuml", 0xdc),
    g(":e", "euml", 0xeb),
    g(":i", "iuml", 0xef),
    g("'a", "aacute", 0xe1),
    g("'e", "eacute", 0xe9),
    g("'i", "iacute", 0xed),
    g("'o", "oacute", 0xf3),
    g("'u", "uacute", 0xfa),
    g("'E", "Eacute", 0xc9),
    g("`a", "agrave", 0xe0),
    g("`e", "egrave", 0xe8),
    g("^a", "acirc", 0xe2),
    g("^e", "ecirc", 0xea),
    g("^o", "ocirc", 0xf4),
    g("~n", "ntilde", 0xf1),
    g("~N", "Ntilde", 0xd1),
    g(",c", "ccedil", 0xe7),
    g(",C", "Ccedil", 0xc7),
    g("oa", "aring", 0xe5),
    g("oA", "Aring", 0xc5),
    g("/o", "oslash", 0xf8),
    g("/O", "Oslash", 0xd8),
    g("ae", "aelig", 0xe6),
    g("AE", "AElig", 0xc6),
    // Greek
    g("*a", "alpha", 0x3b1),
    g("*b", "beta", 0x3b2),
    g("*g", "gamma", 0x3b3),
    g("*d", "delta", 0x3b4),
    g("*e", "epsilon", 0x3b5),
    g("*l", "lambda", 0x3bb),
    g("*m", "mu", 0x3bc),
    g("*p", "pi", 0x3c0),
    g("*s", "sigma", 0x3c3),
    g("*t", "tau", 0x3c4),
    g("*W", "Omega", 0x3a9),
];

/// Look up a troff glyph name.
pub fn lookup(name: &str) -> Option<&'static Glyph> {
    GLYPHS.iter().find(|glyph| glyph.name == name)
}

/// Find the glyph carrying the given entity name.
pub fn by_entity(entity: &str) -> Option<&'static Glyph> {
    GLYPHS.iter().find(|glyph| glyph.entity == Some(entity))
}

/// Entities that XML predefines and that never need a declaration.
pub const PREDEFINED_ENTITIES: &[&str] = &["amp", "lt", "gt", "quot", "apos"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("em").and_then(|g| g.entity), Some("mdash"));
        assert_eq!(lookup("rs").map(|g| g.codepoint), Some(0x5c));
        assert!(lookup("zz").is_none());
    }

    #[test]
    fn test_by_entity() {
        assert_eq!(by_entity("bull").map(|g| g.name), Some("bu"));
    }
}
