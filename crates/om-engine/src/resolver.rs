//! Exact-name correspondence resolution.

use om_core::{
    ConfigurationError, Correspondence, CorrespondenceList, CorrespondenceResolver, MemberPath, Schema,
    SourceAccessor, TypePair,
};

/// Links every target member to the source member with the same name.
///
/// Target members without a namesake are left out and keep whatever value
/// the target already holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactNameResolver;

impl CorrespondenceResolver for ExactNameResolver {
    fn resolve(&self, schema: &Schema, pair: TypePair) -> Result<CorrespondenceList, ConfigurationError> {
        let source = schema.shape(pair.source)?;
        let target = schema.shape(pair.target)?;
        let (Some(source_layout), Some(target_layout)) = (source.layout(), target.layout()) else {
            return Ok(CorrespondenceList::new());
        };

        let mut list = CorrespondenceList::new();
        for member in &target_layout.members {
            if source_layout.member_index(&member.name).is_none() {
                continue;
            }
            let from = MemberPath::resolve(schema, pair.source, &member.name)?;
            let to = MemberPath::resolve(schema, pair.target, &member.name)?;
            list.upsert(Correspondence::new(SourceAccessor::Member(from), to));
        }
        Ok(list)
    }
}
