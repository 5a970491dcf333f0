use std::fmt;

/// Comma delimited
pub(super) struct Comma<L>(pub(super) L);

/// Items delimited by `,\n\t`, the separator of multi-line option lists.
pub(super) struct Fields<L>(pub(super) L);

fn delimited<L>(f: &mut fmt::Formatter<'_>, items: L, sep: &str) -> fmt::Result
where
    L: IntoIterator,
    L::Item: fmt::Display,
{
    let mut s = "";
    for item in items {
        write!(f, "{s}{item}")?;
        s = sep;
    }
    Ok(())
}

impl<L> fmt::Display for Comma<L>
where
    L: IntoIterator + Clone,
    L::Item: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        delimited(f, self.0.clone(), ", ")
    }
}

impl<L> fmt::Display for Fields<L>
where
    L: IntoIterator + Clone,
    L::Item: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        delimited(f, self.0.clone(), ",\n\t")
    }
}
