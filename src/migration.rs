use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(Migration001CreateTables)]
    }
}

pub struct Migration001CreateTables;

impl MigrationName for Migration001CreateTables {
    fn name(&self) -> &str {
        "m001_create_mail_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration001CreateTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // mail_objects table
        manager
            .create_table(
                Table::create()
                    .table(MailObjects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MailObjects::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MailObjects::Namespace)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MailObjects::Account)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MailObjects::Path).text().not_null())
                    .col(ColumnDef::new(MailObjects::Kind).string_len(1).not_null())
                    .col(ColumnDef::new(MailObjects::Uid).big_integer().null())
                    .col(ColumnDef::new(MailObjects::Filename).text().not_null())
                    .col(
                        ColumnDef::new(MailObjects::Flags)
                            .string_len(64)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(MailObjects::Size).big_integer().not_null())
                    .col(ColumnDef::new(MailObjects::Md5).string_len(32).not_null())
                    .col(ColumnDef::new(MailObjects::Sha256).string_len(64).not_null())
                    .col(ColumnDef::new(MailObjects::Headers).json_binary().null())
                    .col(
                        ColumnDef::new(MailObjects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MailObjects::ModifiedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Folder listings and directory scans filter on these three
        manager
            .create_index(
                Index::create()
                    .name("idx_mail_objects_scope")
                    .table(MailObjects::Table)
                    .col(MailObjects::Namespace)
                    .col(MailObjects::Path)
                    .col(MailObjects::Kind)
                    .to_owned(),
            )
            .await?;

        // mail_payloads table
        manager
            .create_table(
                Table::create()
                    .table(MailPayloads::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MailPayloads::ObjectId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MailPayloads::Data).binary().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(MailPayloads::Table, MailPayloads::ObjectId)
                            .to(MailObjects::Table, MailObjects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MailPayloads::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MailObjects::Table).to_owned())
            .await?;
        Ok(())
    }
}

// ========== Table identifiers ==========

#[derive(Iden)]
enum MailObjects {
    Table,
    Id,
    Namespace,
    Account,
    Path,
    Kind,
    Uid,
    Filename,
    Flags,
    Size,
    Md5,
    Sha256,
    Headers,
    CreatedAt,
    ModifiedAt,
}

#[derive(Iden)]
enum MailPayloads {
    Table,
    ObjectId,
    Data,
}
