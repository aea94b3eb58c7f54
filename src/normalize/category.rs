/// Genre-substring to canonical translated content-type table.
///
/// Order is part of the contract: the first entry whose key occurs
/// anywhere in the raw category wins, so overlapping keys resolve by
/// position here, never by length or specificity.
pub const CONTENT_TYPES: [(&str, &str); 14] = [
    ("교양", "Arts / Culture (without music)"),
    ("만화", "Cartoons / Puppets"),
    ("교육", "Education / Science / Factual topics"),
    ("취미", "Leisure hobbies"),
    ("드라마", "Movie / Drama"),
    ("영화", "Movie / Drama"),
    ("음악", "Music / Ballet / Dance"),
    ("뉴스", "News / Current affairs"),
    ("다큐", "Documentary"),
    ("라이프", "Documentary"),
    ("시사/다큐", "Documentary"),
    ("연예", "Show / Game show"),
    ("스포츠", "Sports"),
    ("홈쇼핑", "Advertisement / Shopping"),
];

/// Maps a raw, locale-specific genre label to its canonical content type.
/// Unknown labels map to an empty content type; the raw label itself is
/// carried on the programme unchanged either way.
pub fn content_type(category: &str) -> &'static str {
    for (key, value) in CONTENT_TYPES {
        if category.contains(key) {
            return value;
        }
    }
    ""
}
